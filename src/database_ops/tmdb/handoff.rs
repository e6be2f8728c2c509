//! Batch hand-off artifact written by `collect` and read back by `ingest`.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::collector::CandidateSummary;
use super::models::MovieId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionArtifact {
    pub total_movies: usize,
    pub movie_ids: Vec<MovieId>,
    pub batch_size: usize,
    pub batches: Vec<Vec<MovieId>>,
    #[serde(default)]
    pub movie_details: Vec<CandidateSummary>,
    pub collection_date: DateTime<Utc>,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub description: String,
}

/// Fixed-size contiguous chunks; the last one may be shorter.
pub fn chunk_ids(ids: &[MovieId], batch_size: usize) -> Result<Vec<Vec<MovieId>>> {
    if batch_size == 0 {
        bail!("batch size must be at least 1");
    }
    Ok(ids.chunks(batch_size).map(<[MovieId]>::to_vec).collect())
}

impl CollectionArtifact {
    pub fn build(
        summaries: Vec<CandidateSummary>,
        batch_size: usize,
        profile: &str,
        description: &str,
    ) -> Result<Self> {
        let movie_ids: Vec<MovieId> = summaries.iter().map(|s| s.id).collect();
        let batches = chunk_ids(&movie_ids, batch_size)?;
        Ok(Self {
            total_movies: movie_ids.len(),
            movie_ids,
            batch_size,
            batches,
            movie_details: summaries,
            collection_date: Utc::now(),
            profile: profile.to_string(),
            description: description.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing collection artifact")?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let artifact: Self = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a collection artifact", path.display()))?;
        if artifact.batch_size == 0 {
            bail!("{}: batch_size must be at least 1", path.display());
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: MovieId) -> CandidateSummary {
        CandidateSummary {
            id,
            title: format!("Movie {id}"),
            original_title: String::new(),
            release_date: "2002-08-30".into(),
            vote_average: 8.0,
            popularity: 1.0,
            overview: String::new(),
            original_language: "pt".into(),
            production_countries: vec!["Brazil".into()],
            strategy: "discover_popularity.desc".into(),
        }
    }

    #[test]
    fn chunks_are_contiguous_and_fixed_size() {
        let chunks = chunk_ids(&[1, 2, 3, 4, 5], 2).unwrap();
        assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5]]);
        assert!(chunk_ids(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(chunk_ids(&[1, 2], 0).is_err());
        assert!(CollectionArtifact::build(vec![summary(1)], 0, "brazilian", "").is_err());
    }

    #[test]
    fn saves_and_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brazilian_movies.json");
        let artifact = CollectionArtifact::build(
            vec![summary(598), summary(11), summary(550)],
            2,
            "brazilian",
            "Collection of Brazilian movies from TMDB",
        )
        .unwrap();
        artifact.save(&path).unwrap();

        let loaded = CollectionArtifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.movie_ids, vec![598, 11, 550]);
        assert_eq!(loaded.batches, vec![vec![598, 11], vec![550]]);
        assert_eq!(loaded.total_movies, 3);
    }

    #[test]
    fn loads_artifact_without_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        fs::write(
            &path,
            r#"{"total_movies":2,"movie_ids":[1,2],"batch_size":1,"batches":[[1],[2]],
                "collection_date":"2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        let loaded = CollectionArtifact::load(&path).unwrap();
        assert_eq!(loaded.movie_ids, vec![1, 2]);
        assert!(loaded.movie_details.is_empty());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CollectionArtifact::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
