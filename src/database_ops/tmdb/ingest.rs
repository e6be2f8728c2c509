//! Pipeline driver: fetch → normalize → write, one movie at a time, in fixed-size
//! batches with a cooperative pause between them.

use anyhow::{bail, Result};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::client::CatalogSource;
use super::models::MovieId;
use crate::database_ops::write_ops::MovieStore;
use crate::normalization::movie::normalize;
use crate::util::env as env_util;

pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 1000;

/// Ids ingested when no artifact or explicit list is given.
pub const FALLBACK_MOVIE_IDS: [MovieId; 10] =
    [11, 550, 13, 120, 680, 155, 598, 24428, 27205, 475557];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub batch_pause: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: Duration::from_millis(DEFAULT_BATCH_PAUSE_MS),
        }
    }
}

impl IngestSettings {
    /// `INGEST_BATCH_SIZE` / `INGEST_BATCH_PAUSE_MS`, falling back to the defaults.
    pub fn from_env() -> Self {
        Self {
            batch_size: env_util::env_parse("INGEST_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            batch_pause: Duration::from_millis(env_util::env_parse(
                "INGEST_BATCH_PAUSE_MS",
                DEFAULT_BATCH_PAUSE_MS,
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPhase {
    Idle,
    Fetching,
    Normalizing,
    Writing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieOutcome {
    Written { ops: usize, with_credits: bool },
    DetailUnavailable,
    WriteFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub detail_missing: usize,
    pub credits_missing: usize,
    pub write_failed: usize,
    pub batches: usize,
    pub ops_written: usize,
}

impl IngestSummary {
    fn record(&mut self, outcome: MovieOutcome) {
        self.processed += 1;
        match outcome {
            MovieOutcome::Written { ops, with_credits } => {
                self.succeeded += 1;
                self.ops_written += ops;
                if !with_credits {
                    self.credits_missing += 1;
                }
            }
            MovieOutcome::DetailUnavailable => {
                self.failed += 1;
                self.detail_missing += 1;
            }
            MovieOutcome::WriteFailed => {
                self.failed += 1;
                self.write_failed += 1;
            }
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.succeeded as f64 * 100.0 / self.processed as f64
        }
    }
}

pub struct IngestDriver<'a, C: CatalogSource + ?Sized, S: MovieStore + ?Sized> {
    catalog: &'a C,
    store: &'a mut S,
    settings: IngestSettings,
    phase: IngestPhase,
}

impl<'a, C: CatalogSource + ?Sized, S: MovieStore + ?Sized> IngestDriver<'a, C, S> {
    pub fn new(catalog: &'a C, store: &'a mut S, settings: IngestSettings) -> Self {
        Self {
            catalog,
            store,
            settings,
            phase: IngestPhase::Idle,
        }
    }

    pub fn phase(&self) -> IngestPhase {
        self.phase
    }

    /// Process every id in order. Per-movie failures are counted, never propagated.
    pub async fn run(&mut self, ids: &[MovieId]) -> Result<IngestSummary> {
        if self.settings.batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        let mut summary = IngestSummary::default();
        let total_batches = ids.len().div_ceil(self.settings.batch_size);
        info!(
            movies = ids.len(),
            batches = total_batches,
            batch_size = self.settings.batch_size,
            "ingest starting"
        );

        for (batch_idx, batch) in ids.chunks(self.settings.batch_size).enumerate() {
            info!(batch = batch_idx + 1, of = total_batches, size = batch.len(), "processing batch");
            for &movie_id in batch {
                let outcome = self.ingest_movie(movie_id).await;
                summary.record(outcome);
            }
            summary.batches += 1;
            info!(
                batch = batch_idx + 1,
                processed = summary.processed,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "batch finished"
            );
            let is_last = batch_idx + 1 == total_batches;
            if !is_last && !self.settings.batch_pause.is_zero() {
                debug!(pause_ms = self.settings.batch_pause.as_millis() as u64, "pausing between batches");
                tokio::time::sleep(self.settings.batch_pause).await;
            }
        }

        self.phase = IngestPhase::Done;
        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            detail_missing = summary.detail_missing,
            credits_missing = summary.credits_missing,
            write_failed = summary.write_failed,
            ops = summary.ops_written,
            success_rate = %format!("{:.1}%", summary.success_rate()),
            "ingest finished"
        );
        Ok(summary)
    }

    #[instrument(skip(self))]
    pub async fn ingest_movie(&mut self, movie_id: MovieId) -> MovieOutcome {
        self.phase = IngestPhase::Fetching;
        let detail = match self.catalog.movie_detail(movie_id).await {
            Ok(d) => d,
            Err(err) => {
                warn!(movie_id, error = %err, "detail unavailable; skipping movie");
                return MovieOutcome::DetailUnavailable;
            }
        };
        let credits = match self.catalog.movie_credits(movie_id).await {
            Ok(c) => Some(c),
            Err(err) => {
                warn!(movie_id, error = %err, "credits unavailable; writing movie-only ops");
                None
            }
        };

        self.phase = IngestPhase::Normalizing;
        let ops = normalize(&detail, credits.as_ref());

        self.phase = IngestPhase::Writing;
        match self.store.apply(movie_id, &ops).await {
            Ok(()) => {
                debug!(movie_id, title = %detail.title, ops = ops.len(), "movie written");
                MovieOutcome::Written {
                    ops: ops.len(),
                    with_credits: credits.is_some(),
                }
            }
            Err(err) => {
                error!(movie_id, error = %err, "write failed; movie rolled back");
                MovieOutcome::WriteFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::memory::MemoryStore;
    use crate::database_ops::tmdb::test_support::{credits, detail, FakeCatalog};
    use crate::database_ops::tmdb::models::ProductionCompany;
    use crate::database_ops::write_ops::WriteOp;

    fn settings(batch_size: usize) -> IngestSettings {
        IngestSettings {
            batch_size,
            batch_pause: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_per_movie() {
        let catalog = FakeCatalog::new()
            .with_detail(detail(1, &["BR"], "pt"))
            .with_credits(credits(1, 3))
            // 2 has no detail at all
            .with_detail(detail(3, &["BR"], "pt"));
        let mut store = MemoryStore::new();

        let summary = IngestDriver::new(&catalog, &mut store, settings(2))
            .run(&[1, 2, 3])
            .await
            .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.detail_missing, 1);
        assert_eq!(summary.credits_missing, 1);
        assert_eq!(summary.batches, 2);
        assert_eq!(store.tables().movies.len(), 2);
        // movie 3 went in without credits
        assert!(store.tables().acted_in.iter().all(|(m, _)| *m == 1));
    }

    #[tokio::test]
    async fn write_failure_rolls_back_and_continues() {
        let mut broken = detail(2, &["BR"], "pt");
        broken.production_companies = vec![ProductionCompany {
            id: 900,
            name: "Ghost".into(),
            origin_country: String::new(),
        }];
        let catalog = FakeCatalog::new()
            .with_detail(detail(1, &["BR"], "pt"))
            .with_detail(broken)
            .with_detail(detail(3, &["US"], "pt"));

        struct RejectMovie2(MemoryStore);
        #[async_trait::async_trait]
        impl MovieStore for RejectMovie2 {
            async fn apply(
                &mut self,
                movie_id: MovieId,
                ops: &[WriteOp],
            ) -> Result<(), crate::database_ops::write_ops::WriteError> {
                if movie_id == 2 {
                    let mut ops = ops.to_vec();
                    ops.push(WriteOp::LinkActedIn {
                        movie_id,
                        actor_id: -1,
                    });
                    return self.0.apply(movie_id, &ops).await;
                }
                self.0.apply(movie_id, ops).await
            }
        }

        let mut store = RejectMovie2(MemoryStore::new());
        let summary = IngestDriver::new(&catalog, &mut store, settings(10))
            .run(&[1, 2, 3])
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.write_failed, 1);
        let tables = store.0.tables();
        assert!(tables.movies.contains_key(&1));
        assert!(!tables.movies.contains_key(&2));
        assert!(!tables.producers.contains_key(&900));
        assert!(tables.movies.contains_key(&3));
        assert_eq!(store.0.rolled_back(), 1);
    }

    #[tokio::test]
    async fn fetches_detail_then_credits_in_id_order() {
        let catalog = FakeCatalog::new()
            .with_detail(detail(5, &[], "pt"))
            .with_detail(detail(6, &[], "pt"));
        let mut store = MemoryStore::new();
        let mut driver = IngestDriver::new(&catalog, &mut store, settings(1));
        assert_eq!(driver.phase(), IngestPhase::Idle);
        driver.run(&[5, 6]).await.unwrap();
        assert_eq!(driver.phase(), IngestPhase::Done);

        assert_eq!(
            catalog.calls(),
            vec!["detail:5", "credits:5", "detail:6", "credits:6"]
        );
    }

    #[tokio::test]
    async fn missing_detail_skips_credits_fetch() {
        let catalog = FakeCatalog::new();
        let mut store = MemoryStore::new();
        let outcome = IngestDriver::new(&catalog, &mut store, settings(1))
            .ingest_movie(42)
            .await;
        assert_eq!(outcome, MovieOutcome::DetailUnavailable);
        assert_eq!(catalog.calls(), vec!["detail:42"]);
    }

    #[tokio::test]
    async fn empty_id_list_is_a_clean_run() {
        let catalog = FakeCatalog::new();
        let mut store = MemoryStore::new();
        let summary = IngestDriver::new(&catalog, &mut store, settings(25))
            .run(&[])
            .await
            .unwrap();
        assert_eq!(summary, IngestSummary::default());
        assert_eq!(summary.success_rate(), 0.0);
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let catalog = FakeCatalog::new();
        let mut store = MemoryStore::new();
        assert!(IngestDriver::new(&catalog, &mut store, settings(0))
            .run(&[1])
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_batches_but_not_after_the_last() {
        let catalog = FakeCatalog::new();
        let mut store = MemoryStore::new();
        let pause = Duration::from_secs(5);
        let start = tokio::time::Instant::now();
        IngestDriver::new(
            &catalog,
            &mut store,
            IngestSettings {
                batch_size: 1,
                batch_pause: pause,
            },
        )
        .run(&[1, 2, 3])
        .await
        .unwrap();
        // three batches, two pauses
        let elapsed = start.elapsed();
        assert!(elapsed >= pause * 2, "elapsed {elapsed:?}");
        assert!(elapsed < pause * 3, "elapsed {elapsed:?}");
    }
}
