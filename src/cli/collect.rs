use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::database_ops::tmdb::client::CatalogSource;
use crate::database_ops::tmdb::collector::CandidateCollector;
use crate::database_ops::tmdb::handoff::CollectionArtifact;
use crate::database_ops::tmdb::stats::{top_by_popularity, CollectionStats};
use crate::database_ops::tmdb::strategy::CollectionProfile;
use crate::database_ops::tmdb::TmdbClient;
use crate::normalization::membership::MembershipFilter;

#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub profile: CollectionProfile,
    /// Defaults to the profile's target.
    pub target: Option<usize>,
    /// Defaults to the profile's batch size.
    pub batch_size: Option<usize>,
    /// Defaults to `<profile>_movies.json` in the working directory.
    pub out: Option<PathBuf>,
}

impl CollectConfig {
    pub fn new(profile: CollectionProfile) -> Self {
        Self {
            profile,
            target: None,
            batch_size: None,
            out: None,
        }
    }

    fn out_path(&self) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_movies.json", self.profile.name())))
    }
}

pub async fn run(cfg: CollectConfig) -> Result<CollectionArtifact> {
    let client = TmdbClient::from_env().context("building TMDB client")?;
    collect_with(&client, &cfg).await
}

/// Collect with any catalog source and write the hand-off artifact.
pub async fn collect_with<C: CatalogSource + ?Sized>(
    catalog: &C,
    cfg: &CollectConfig,
) -> Result<CollectionArtifact> {
    let profile = cfg.profile;
    let target = cfg.target.unwrap_or_else(|| profile.default_target());
    let batch_size = cfg.batch_size.unwrap_or_else(|| profile.default_batch_size());
    let strategies = profile.strategies();
    info!(
        profile = profile.name(),
        target,
        strategies = strategies.len(),
        "collection starting"
    );

    let mut collector = CandidateCollector::new(catalog);
    if profile.requires_membership() {
        collector = collector.with_membership(MembershipFilter::brazilian());
    }
    let (accepted, _reports) = collector.collect(&strategies, target).await;
    let summaries = accepted.summaries();

    let stats = CollectionStats::from_summaries(&summaries);
    stats.log();
    for (rank, s) in top_by_popularity(&summaries, 10).iter().enumerate() {
        println!(
            "{:>2}. {} ({}) popularity={:.1} id={}",
            rank + 1,
            s.title,
            s.release_date.get(..4).unwrap_or("----"),
            s.popularity,
            s.id
        );
    }

    let artifact =
        CollectionArtifact::build(summaries, batch_size, profile.name(), profile.description())?;
    let out = cfg.out_path();
    artifact.save(&out)?;
    info!(
        path = %out.display(),
        movies = artifact.total_movies,
        batches = artifact.batches.len(),
        "collection artifact written"
    );
    Ok(artifact)
}
