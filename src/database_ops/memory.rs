//! In-memory store with the same conflict and foreign-key behavior as the Postgres
//! schema. Backs `ingest --dry-run` and the pipeline tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use crate::database_ops::tmdb::models::MovieId;
use crate::database_ops::write_ops::{MovieRow, MovieStore, WriteError, WriteOp};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMovie {
    pub row: MovieRow,
    pub producer_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProducer {
    pub company_name: String,
    pub origin_country: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    pub movies: BTreeMap<MovieId, StoredMovie>,
    pub genres: BTreeMap<i64, String>,
    pub producers: BTreeMap<i64, StoredProducer>,
    pub actors: BTreeMap<i64, String>,
    pub directors: BTreeMap<i64, String>,
    pub writers: BTreeMap<i64, String>,
    pub movie_genre: BTreeSet<(MovieId, i64)>,
    pub acted_in: BTreeSet<(MovieId, i64)>,
    pub movie_director: BTreeSet<(MovieId, i64)>,
    pub movie_writer: BTreeSet<(MovieId, i64)>,
}

impl MemoryTables {
    /// Row counts keyed by table name, same order as the schema.
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("movie", self.movies.len()),
            ("genre", self.genres.len()),
            ("movie_genre", self.movie_genre.len()),
            ("producer", self.producers.len()),
            ("actor", self.actors.len()),
            ("acted_in", self.acted_in.len()),
            ("director", self.directors.len()),
            ("movie_director", self.movie_director.len()),
            ("writer", self.writers.len()),
            ("movie_writer", self.movie_writer.len()),
        ]
    }

    fn apply_op(&mut self, index: usize, op: &WriteOp) -> Result<(), WriteError> {
        let violation = |constraint: &str| WriteError::Constraint {
            index,
            op: op.label(),
            constraint: constraint.to_string(),
        };
        match op {
            WriteOp::UpsertMovie(row) => {
                self.movies
                    .entry(row.movie_id)
                    .and_modify(|m| m.row = row.clone())
                    .or_insert_with(|| StoredMovie {
                        row: row.clone(),
                        producer_id: None,
                    });
            }
            WriteOp::InsertGenre {
                genre_id,
                genre_name,
            } => {
                self.genres
                    .entry(*genre_id)
                    .or_insert_with(|| genre_name.clone());
            }
            WriteOp::LinkMovieGenre { movie_id, genre_id } => {
                if !self.movies.contains_key(movie_id) {
                    return Err(violation("movie_genre_movie_id_fkey"));
                }
                if !self.genres.contains_key(genre_id) {
                    return Err(violation("movie_genre_genre_id_fkey"));
                }
                self.movie_genre.insert((*movie_id, *genre_id));
            }
            WriteOp::InsertProducer {
                producer_id,
                company_name,
                origin_country,
            } => {
                self.producers
                    .entry(*producer_id)
                    .or_insert_with(|| StoredProducer {
                        company_name: company_name.clone(),
                        origin_country: origin_country.clone(),
                    });
            }
            WriteOp::SetPrimaryProducer {
                movie_id,
                producer_id,
            } => {
                if !self.producers.contains_key(producer_id) {
                    return Err(violation("movie_producer_id_fkey"));
                }
                // UPDATE on a missing movie touches zero rows
                if let Some(movie) = self.movies.get_mut(movie_id) {
                    movie.producer_id = Some(*producer_id);
                }
            }
            WriteOp::InsertActor { actor_id, name } => {
                self.actors.entry(*actor_id).or_insert_with(|| name.clone());
            }
            WriteOp::LinkActedIn { movie_id, actor_id } => {
                if !self.movies.contains_key(movie_id) {
                    return Err(violation("acted_in_movie_id_fkey"));
                }
                if !self.actors.contains_key(actor_id) {
                    return Err(violation("acted_in_actor_id_fkey"));
                }
                self.acted_in.insert((*movie_id, *actor_id));
            }
            WriteOp::InsertDirector {
                director_id,
                full_name,
            } => {
                self.directors
                    .entry(*director_id)
                    .or_insert_with(|| full_name.clone());
            }
            WriteOp::LinkMovieDirector {
                movie_id,
                director_id,
            } => {
                if !self.movies.contains_key(movie_id) {
                    return Err(violation("movie_director_movie_id_fkey"));
                }
                if !self.directors.contains_key(director_id) {
                    return Err(violation("movie_director_director_id_fkey"));
                }
                self.movie_director.insert((*movie_id, *director_id));
            }
            WriteOp::InsertWriter {
                writer_id,
                full_name,
            } => {
                self.writers
                    .entry(*writer_id)
                    .or_insert_with(|| full_name.clone());
            }
            WriteOp::LinkMovieWriter {
                movie_id,
                writer_id,
            } => {
                if !self.movies.contains_key(movie_id) {
                    return Err(violation("movie_writer_movie_id_fkey"));
                }
                if !self.writers.contains_key(writer_id) {
                    return Err(violation("movie_writer_writer_id_fkey"));
                }
                self.movie_writer.insert((*movie_id, *writer_id));
            }
        }
        Ok(())
    }
}

/// Batches are staged on a copy of the tables and swapped in only when every op succeeds.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: MemoryTables,
    committed: usize,
    rolled_back: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &MemoryTables {
        &self.tables
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn rolled_back(&self) -> usize {
        self.rolled_back
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn apply(&mut self, _movie_id: MovieId, ops: &[WriteOp]) -> Result<(), WriteError> {
        let mut staged = self.tables.clone();
        for (index, op) in ops.iter().enumerate() {
            if let Err(err) = staged.apply_op(index, op) {
                self.rolled_back += 1;
                return Err(err);
            }
        }
        self.tables = staged;
        self.committed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::tmdb::test_support::{credits, detail};
    use crate::normalization::movie::normalize;

    #[tokio::test]
    async fn ingesting_twice_is_idempotent() {
        let d = detail(598, &["BR"], "pt");
        let c = credits(598, 12);
        let mut store = MemoryStore::new();

        store.apply(598, &normalize(&d, Some(&c))).await.unwrap();
        let once = store.tables().clone();
        store.apply(598, &normalize(&d, Some(&c))).await.unwrap();

        assert_eq!(store.tables(), &once);
        assert_eq!(once.movies.len(), 1);
        assert_eq!(once.acted_in.len(), 10);
        assert_eq!(once.movies[&598].producer_id, Some(345));
    }

    #[tokio::test]
    async fn movie_scalars_follow_latest_fetch_but_lookups_keep_first_writer() {
        let mut store = MemoryStore::new();
        let first = detail(598, &["BR"], "pt");
        store.apply(598, &normalize(&first, None)).await.unwrap();

        let mut second = first.clone();
        second.title = "City of God".into();
        second.runtime = 135;
        second.genres[0].name = "Drama (renamed)".into();
        store.apply(598, &normalize(&second, None)).await.unwrap();

        let tables = store.tables();
        assert_eq!(tables.movies[&598].row.title, "City of God");
        assert_eq!(tables.movies[&598].row.duration_minutes, 135);
        assert_eq!(tables.genres[&18], "Drama");
        assert_eq!(tables.movies.len(), 1);
    }

    #[tokio::test]
    async fn failing_op_rolls_back_the_whole_batch() {
        let mut store = MemoryStore::new();
        let mut ops = normalize(&detail(598, &["BR"], "pt"), Some(&credits(598, 3)));
        // actor 999 was never inserted
        ops.push(WriteOp::LinkActedIn {
            movie_id: 598,
            actor_id: 999,
        });

        let err = store.apply(598, &ops).await.unwrap_err();
        match err {
            WriteError::Constraint { index, op, .. } => {
                assert_eq!(index, ops.len() - 1);
                assert_eq!(op, "link_acted_in");
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(store.tables(), &MemoryTables::default());
        assert_eq!(store.rolled_back(), 1);
        assert_eq!(store.committed(), 0);
    }

    #[tokio::test]
    async fn failed_batch_leaves_earlier_commits_intact() {
        let mut store = MemoryStore::new();
        store
            .apply(1, &normalize(&detail(1, &["BR"], "pt"), None))
            .await
            .unwrap();
        let before = store.tables().clone();

        let bad = vec![
            WriteOp::UpsertMovie(crate::normalization::movie::movie_row(&detail(2, &[], "pt"))),
            WriteOp::LinkMovieGenre {
                movie_id: 2,
                genre_id: 4242,
            },
        ];
        assert!(store.apply(2, &bad).await.is_err());
        assert_eq!(store.tables(), &before);
    }

    #[tokio::test]
    async fn primary_producer_update_on_unknown_movie_is_a_no_op() {
        let mut store = MemoryStore::new();
        let ops = vec![
            WriteOp::InsertProducer {
                producer_id: 1,
                company_name: "A".into(),
                origin_country: "BR".into(),
            },
            WriteOp::SetPrimaryProducer {
                movie_id: 77,
                producer_id: 1,
            },
        ];
        store.apply(77, &ops).await.unwrap();
        assert!(store.tables().movies.is_empty());
        assert_eq!(store.tables().producers.len(), 1);
    }
}
