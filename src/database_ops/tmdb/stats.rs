use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::info;

use super::collector::CandidateSummary;

/// Fixed-shape counts over a finished collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionStats {
    pub total: usize,
    /// Strategy label -> accepted candidates, in first-seen order.
    pub by_strategy: IndexMap<String, usize>,
    pub by_language: IndexMap<String, usize>,
    /// Decade start year (1990, 2000, ...) -> count.
    pub by_decade: BTreeMap<i32, usize>,
}

fn decade_of(release_date: &str) -> Option<i32> {
    let year: i32 = release_date.get(..4)?.parse().ok()?;
    Some(year - year.rem_euclid(10))
}

impl CollectionStats {
    pub fn from_summaries(summaries: &[CandidateSummary]) -> Self {
        let mut stats = Self {
            total: summaries.len(),
            ..Self::default()
        };
        for s in summaries {
            *stats.by_strategy.entry(s.strategy.clone()).or_insert(0) += 1;
            let language = if s.original_language.is_empty() {
                "unknown".to_string()
            } else {
                s.original_language.clone()
            };
            *stats.by_language.entry(language).or_insert(0) += 1;
            if let Some(decade) = decade_of(&s.release_date) {
                *stats.by_decade.entry(decade).or_insert(0) += 1;
            }
        }
        stats
    }

    pub fn log(&self) {
        info!(total = self.total, "collection statistics");
        for (strategy, count) in &self.by_strategy {
            info!(strategy = %strategy, count, "by strategy");
        }
        for (language, count) in &self.by_language {
            info!(language = %language, count, "by language");
        }
        for (decade, count) in &self.by_decade {
            info!(decade = %format!("{decade}s"), count, "by decade");
        }
    }
}

/// Highest popularity first; ties keep acceptance order.
pub fn top_by_popularity(summaries: &[CandidateSummary], n: usize) -> Vec<&CandidateSummary> {
    let mut sorted: Vec<&CandidateSummary> = summaries.iter().collect();
    sorted.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
    sorted.truncate(n);
    sorted
}
