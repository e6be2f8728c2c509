//! Candidate collection: walk an ordered list of strategies page by page, keeping
//! each catalog id once (first strategy to surface it wins) until the target count
//! is met or the strategies run out.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::client::CatalogSource;
use super::models::{MovieDetail, MovieId, MovieListItem};
use super::strategy::Strategy;
use crate::normalization::membership::MembershipFilter;

/// Lightweight record captured when a candidate is accepted; never replaced afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub production_countries: Vec<String>,
    pub strategy: String,
}

impl CandidateSummary {
    fn from_listing(item: &MovieListItem, strategy: &str, detail: Option<&MovieDetail>) -> Self {
        let (original_language, production_countries) = match detail {
            Some(d) => (
                d.original_language.clone(),
                d.production_countries
                    .iter()
                    .map(|c| c.name.clone())
                    .collect(),
            ),
            None => (item.original_language.clone(), Vec::new()),
        };
        Self {
            id: item.id,
            title: item.title.clone(),
            original_title: item.original_title.clone(),
            release_date: item.release_date.clone(),
            vote_average: item.vote_average,
            popularity: item.popularity,
            overview: item.overview.clone(),
            original_language,
            production_countries,
            strategy: strategy.to_string(),
        }
    }
}

/// Accepted candidates keyed by id, in acceptance order.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    accepted: IndexMap<MovieId, CandidateSummary>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn contains(&self, id: MovieId) -> bool {
        self.accepted.contains_key(&id)
    }

    /// Returns false (and keeps the existing summary) when the id is already present.
    pub fn accept(&mut self, summary: CandidateSummary) -> bool {
        if self.accepted.contains_key(&summary.id) {
            return false;
        }
        self.accepted.insert(summary.id, summary);
        true
    }

    pub fn ids(&self) -> Vec<MovieId> {
        self.accepted.keys().copied().collect()
    }

    pub fn summaries(&self) -> Vec<CandidateSummary> {
        self.accepted.values().cloned().collect()
    }

    pub fn get(&self, id: MovieId) -> Option<&CandidateSummary> {
        self.accepted.get(&id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    PageCap,
    EmptyPage,
    FailedPage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyReport {
    pub label: String,
    pub pages_fetched: u32,
    pub accepted: usize,
    pub rejected: usize,
    pub stop: StopReason,
}

/// Runs strategies against a catalog, optionally gating each new candidate on
/// the membership filter (one detail fetch per unseen candidate).
pub struct CandidateCollector<'a, C: CatalogSource + ?Sized> {
    catalog: &'a C,
    filter: Option<MembershipFilter>,
}

impl<'a, C: CatalogSource + ?Sized> CandidateCollector<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            filter: None,
        }
    }

    pub fn with_membership(mut self, filter: MembershipFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Collect up to `target` distinct candidates across `strategies`, in order.
    pub async fn collect(
        &self,
        strategies: &[Strategy],
        target: usize,
    ) -> (Accumulator, Vec<StrategyReport>) {
        let mut acc = Accumulator::new();
        let mut reports = Vec::new();
        if target == 0 {
            return (acc, reports);
        }
        for strategy in strategies {
            if acc.len() >= target {
                break;
            }
            let report = self.run_strategy(strategy, target, &mut acc).await;
            info!(
                strategy = %report.label,
                pages = report.pages_fetched,
                accepted = report.accepted,
                rejected = report.rejected,
                stop = ?report.stop,
                total = acc.len(),
                "strategy finished"
            );
            reports.push(report);
        }
        (acc, reports)
    }

    /// Page through one strategy, adding to `acc` until the target, the page cap,
    /// an empty page or a failed page stops it.
    pub async fn run_strategy(
        &self,
        strategy: &Strategy,
        target: usize,
        acc: &mut Accumulator,
    ) -> StrategyReport {
        let mut report = StrategyReport {
            label: strategy.label.clone(),
            pages_fetched: 0,
            accepted: 0,
            rejected: 0,
            stop: StopReason::PageCap,
        };
        let mut page: u32 = 1;
        loop {
            if acc.len() >= target {
                report.stop = StopReason::TargetReached;
                break;
            }
            if page > strategy.page_cap {
                report.stop = StopReason::PageCap;
                break;
            }
            let listing = match self.catalog.page(&strategy.source, page).await {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(strategy = %strategy.label, page, error = %err, "page fetch failed; moving on");
                    report.stop = StopReason::FailedPage;
                    break;
                }
            };
            report.pages_fetched += 1;
            if listing.results.is_empty() {
                report.stop = StopReason::EmptyPage;
                break;
            }

            for item in &listing.results {
                if acc.len() >= target {
                    break;
                }
                if acc.contains(item.id) {
                    continue;
                }
                let summary = match &self.filter {
                    Some(filter) => {
                        let detail = match self.catalog.movie_detail(item.id).await {
                            Ok(d) => Some(d),
                            Err(err) => {
                                warn!(movie_id = item.id, error = %err, "detail fetch failed during verification");
                                None
                            }
                        };
                        if !filter.is_member(detail.as_ref()) {
                            debug!(movie_id = item.id, title = %item.title, "candidate not a member; dropped");
                            report.rejected += 1;
                            continue;
                        }
                        CandidateSummary::from_listing(item, &strategy.label, detail.as_ref())
                    }
                    None => CandidateSummary::from_listing(item, &strategy.label, None),
                };
                debug!(movie_id = item.id, title = %summary.title, strategy = %strategy.label, "candidate accepted");
                if acc.accept(summary) {
                    report.accepted += 1;
                }
            }

            debug!(strategy = %strategy.label, page, total = acc.len(), "page processed");
            page += 1;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::tmdb::strategy::{DiscoverCriteria, MovieList, SearchQuery};
    use crate::database_ops::tmdb::test_support::{detail, FakeCatalog};
    use std::collections::HashSet;

    fn discover(sort: &str, cap: u32) -> Strategy {
        Strategy::discover(format!("discover_{sort}"), DiscoverCriteria::sorted_by(sort, 5), cap)
    }

    #[tokio::test]
    async fn dedups_across_strategies_and_stops_at_target() {
        let catalog = FakeCatalog::new()
            .with_pages("discover:a", vec![vec![10, 20, 10], vec![]])
            .with_pages("discover:b", vec![vec![20, 30, 40]]);
        let strategies = vec![discover("a", 50), discover("b", 50)];

        let collector = CandidateCollector::new(&catalog);
        let mut acc = Accumulator::new();
        let first = collector.run_strategy(&strategies[0], 3, &mut acc).await;
        assert_eq!(acc.ids(), vec![10, 20]);
        assert_eq!(first.stop, StopReason::EmptyPage);

        let second = collector.run_strategy(&strategies[1], 3, &mut acc).await;
        assert_eq!(acc.ids(), vec![10, 20, 30]);
        assert_eq!(second.stop, StopReason::TargetReached);
        assert_eq!(second.accepted, 1);

        let (full, _) = collector.collect(&strategies, 3).await;
        assert_eq!(full.ids(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn first_strategy_keeps_its_summary() {
        let catalog = FakeCatalog::new()
            .with_pages("discover:one", vec![vec![1], vec![7]])
            .with_pages("list:popular", vec![vec![2]])
            .with_pages("search:x", vec![vec![7, 8]]);
        let strategies = vec![
            discover("one", 2),
            Strategy::list(MovieList::Popular, 5),
            Strategy::search(SearchQuery::new("x"), 5),
        ];

        let (acc, _) = CandidateCollector::new(&catalog).collect(&strategies, 10).await;
        assert_eq!(acc.ids(), vec![1, 7, 2, 8]);
        assert_eq!(acc.get(7).unwrap().strategy, "discover_one");
        assert_eq!(acc.get(8).unwrap().strategy, "search_x");
    }

    #[tokio::test]
    async fn output_is_unique_and_bounded() {
        let catalog = FakeCatalog::new()
            .with_pages("discover:a", vec![vec![1, 2, 3, 1], vec![3, 4, 5]])
            .with_pages("discover:b", vec![vec![5, 4, 6, 7, 8]]);
        let strategies = vec![discover("a", 10), discover("b", 10)];
        for target in 0..10 {
            let (acc, _) = CandidateCollector::new(&catalog).collect(&strategies, target).await;
            let ids = acc.ids();
            let unique: HashSet<MovieId> = ids.iter().copied().collect();
            assert_eq!(unique.len(), ids.len());
            assert!(ids.len() <= target);
            assert_eq!(ids.len(), target.min(8));
        }
    }

    #[tokio::test]
    async fn zero_target_makes_no_calls() {
        let catalog = FakeCatalog::new().with_pages("discover:a", vec![vec![1]]);
        let (acc, reports) = CandidateCollector::new(&catalog)
            .collect(&[discover("a", 5)], 0)
            .await;
        assert!(acc.is_empty());
        assert!(reports.is_empty());
        assert!(catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn failing_strategy_stops_after_one_call() {
        let catalog = FakeCatalog::new()
            .failing("discover:broken")
            .with_pages("discover:ok", vec![vec![5]]);
        let strategies = vec![discover("broken", 50), discover("ok", 50)];

        let (acc, reports) = CandidateCollector::new(&catalog).collect(&strategies, 5).await;
        assert_eq!(acc.ids(), vec![5]);
        assert_eq!(reports[0].stop, StopReason::FailedPage);
        let broken_calls = catalog
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("discover:broken"))
            .count();
        assert_eq!(broken_calls, 1);
    }

    #[tokio::test]
    async fn page_cap_bounds_each_strategy() {
        let catalog = FakeCatalog::new().with_pages(
            "discover:deep",
            vec![vec![1], vec![2], vec![3], vec![4]],
        );
        let (acc, reports) = CandidateCollector::new(&catalog)
            .collect(&[discover("deep", 2)], 100)
            .await;
        assert_eq!(acc.ids(), vec![1, 2]);
        assert_eq!(reports[0].stop, StopReason::PageCap);
        assert_eq!(reports[0].pages_fetched, 2);
    }

    #[tokio::test]
    async fn membership_gate_drops_non_members() {
        let catalog = FakeCatalog::new()
            .with_pages("discover:br", vec![vec![1, 2, 3]])
            .with_detail(detail(1, &["BR"], "pt"))
            .with_detail(detail(2, &["US"], "en"))
            .with_detail(detail(3, &["US"], "pt"));
        // 3 passes on language alone

        let (acc, reports) = CandidateCollector::new(&catalog)
            .with_membership(MembershipFilter::brazilian())
            .collect(&[discover("br", 1)], 10)
            .await;
        assert_eq!(acc.ids(), vec![1, 3]);
        assert_eq!(reports[0].rejected, 1);
        let summary = acc.get(1).unwrap();
        assert_eq!(summary.original_language, "pt");
        assert_eq!(summary.production_countries, vec!["Country BR".to_string()]);
    }

    #[tokio::test]
    async fn failed_detail_counts_as_miss() {
        let catalog = FakeCatalog::new().with_pages("discover:br", vec![vec![4]]);
        let (acc, reports) = CandidateCollector::new(&catalog)
            .with_membership(MembershipFilter::brazilian())
            .collect(&[discover("br", 1)], 10)
            .await;
        assert!(acc.is_empty());
        assert_eq!(reports[0].rejected, 1);
    }

    #[tokio::test]
    async fn verification_skips_already_accepted_ids() {
        let catalog = FakeCatalog::new()
            .with_pages("discover:a", vec![vec![1]])
            .with_pages("discover:b", vec![vec![1, 2]])
            .with_detail(detail(1, &["BR"], "pt"))
            .with_detail(detail(2, &["BR"], "pt"));
        let (acc, _) = CandidateCollector::new(&catalog)
            .with_membership(MembershipFilter::brazilian())
            .collect(&[discover("a", 1), discover("b", 1)], 10)
            .await;
        assert_eq!(acc.ids(), vec![1, 2]);
        let detail_calls: Vec<String> = catalog
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("detail:"))
            .collect();
        assert_eq!(detail_calls, vec!["detail:1", "detail:2"]);
    }
}
