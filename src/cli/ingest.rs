use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::database_ops::db::Db;
use crate::database_ops::memory::MemoryStore;
use crate::database_ops::pg_store::{PgStore, DEFAULT_SCHEMA};
use crate::database_ops::tmdb::handoff::CollectionArtifact;
use crate::database_ops::tmdb::ingest::{
    IngestDriver, IngestSettings, IngestSummary, FALLBACK_MOVIE_IDS,
};
use crate::database_ops::tmdb::{MovieId, TmdbClient};
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    /// Hand-off artifact produced by `collect`.
    pub input: Option<PathBuf>,
    /// Explicit ids; wins over `input`.
    pub ids: Option<Vec<MovieId>>,
    pub batch_size: Option<usize>,
    pub pause_ms: Option<u64>,
    /// Defaults to env MOVIES_SCHEMA or `movies_data`.
    pub schema: Option<String>,
    /// Write into the in-memory store instead of Postgres.
    pub dry_run: bool,
}

/// Ids to ingest plus the batch size the artifact was cut with, if any.
pub fn resolve_ids(cfg: &IngestConfig) -> Result<(Vec<MovieId>, Option<usize>)> {
    if let Some(ids) = &cfg.ids {
        return Ok((ids.clone(), None));
    }
    if let Some(path) = &cfg.input {
        let artifact = CollectionArtifact::load(path)?;
        info!(
            path = %path.display(),
            movies = artifact.movie_ids.len(),
            profile = %artifact.profile,
            "loaded collection artifact"
        );
        return Ok((artifact.movie_ids, Some(artifact.batch_size)));
    }
    warn!("no input given; ingesting the built-in sample ids");
    Ok((FALLBACK_MOVIE_IDS.to_vec(), None))
}

fn settings_for(cfg: &IngestConfig, artifact_batch: Option<usize>) -> IngestSettings {
    let mut settings = IngestSettings::from_env();
    if let Some(size) = cfg.batch_size.or(artifact_batch) {
        settings.batch_size = size;
    }
    if let Some(ms) = cfg.pause_ms {
        settings.batch_pause = Duration::from_millis(ms);
    }
    settings
}

pub async fn run(cfg: IngestConfig) -> Result<IngestSummary> {
    let (ids, artifact_batch) = resolve_ids(&cfg)?;
    let settings = settings_for(&cfg, artifact_batch);
    let client = TmdbClient::from_env().context("building TMDB client")?;

    let summary = if cfg.dry_run {
        let mut store = MemoryStore::new();
        let summary = IngestDriver::new(&client, &mut store, settings)
            .run(&ids)
            .await?;
        for (table, rows) in store.tables().counts() {
            println!("{table}: {rows}");
        }
        summary
    } else {
        let schema = cfg
            .schema
            .clone()
            .or_else(|| env_util::env_opt("MOVIES_SCHEMA"))
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        let db = Db::connect(&env_util::db_url()?).await?;
        let mut store = PgStore::open(db, &schema).await?;
        info!(schema = store.schema(), "writing to postgres");
        let result = IngestDriver::new(&client, &mut store, settings)
            .run(&ids)
            .await;
        store.into_db().close().await;
        result?
    };

    println!(
        "processed={} succeeded={} failed={} (detail missing {}, write failed {}) success_rate={:.1}%",
        summary.processed,
        summary.succeeded,
        summary.failed,
        summary.detail_missing,
        summary.write_failed,
        summary.success_rate()
    );
    if summary.processed > 0 && summary.succeeded == 0 {
        bail!("no movie was ingested successfully");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_ids_win_over_input() {
        let cfg = IngestConfig {
            ids: Some(vec![5, 6]),
            input: Some(PathBuf::from("/does/not/exist.json")),
            ..Default::default()
        };
        assert_eq!(resolve_ids(&cfg).unwrap(), (vec![5, 6], None));
    }

    #[test]
    fn falls_back_to_sample_ids() {
        let (ids, batch) = resolve_ids(&IngestConfig::default()).unwrap();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0], 11);
        assert_eq!(batch, None);
    }

    #[test]
    fn artifact_batch_size_applies_unless_overridden() {
        let cfg = IngestConfig {
            pause_ms: Some(0),
            ..Default::default()
        };
        let s = settings_for(&cfg, Some(7));
        assert_eq!(s.batch_size, 7);
        assert_eq!(s.batch_pause, Duration::ZERO);

        let cfg = IngestConfig {
            batch_size: Some(3),
            ..Default::default()
        };
        assert_eq!(settings_for(&cfg, Some(7)).batch_size, 3);
    }

    #[test]
    fn reads_ids_from_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brazilian_movies.json");
        std::fs::write(
            &path,
            r#"{"total_movies":3,"movie_ids":[598,11,550],"batch_size":2,
                "batches":[[598,11],[550]],"collection_date":"2024-05-01T12:00:00Z",
                "profile":"brazilian"}"#,
        )
        .unwrap();
        let cfg = IngestConfig {
            input: Some(path),
            ..Default::default()
        };
        assert_eq!(resolve_ids(&cfg).unwrap(), (vec![598, 11, 550], Some(2)));
    }
}
