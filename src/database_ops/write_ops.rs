//! Store-agnostic write operations and the transactional store seam.
//!
//! Normalization produces a `Vec<WriteOp>` per movie; a `MovieStore` applies that
//! batch atomically. Lookup entities and relationships are insert-if-absent, the
//! movie row is an overwrite-upsert.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::database_ops::tmdb::models::MovieId;

/// Scalar columns of `movie` overwritten on every ingest of the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRow {
    pub movie_id: MovieId,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub duration_minutes: i32,
    pub rating: f64,
    pub synopsis: String,
    pub overview: String,
    pub adult: bool,
    pub budget: i64,
    pub revenue: i64,
    pub tagline: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    UpsertMovie(MovieRow),
    InsertGenre {
        genre_id: i64,
        genre_name: String,
    },
    LinkMovieGenre {
        movie_id: MovieId,
        genre_id: i64,
    },
    InsertProducer {
        producer_id: i64,
        company_name: String,
        origin_country: String,
    },
    SetPrimaryProducer {
        movie_id: MovieId,
        producer_id: i64,
    },
    InsertActor {
        actor_id: i64,
        name: String,
    },
    LinkActedIn {
        movie_id: MovieId,
        actor_id: i64,
    },
    InsertDirector {
        director_id: i64,
        full_name: String,
    },
    LinkMovieDirector {
        movie_id: MovieId,
        director_id: i64,
    },
    InsertWriter {
        writer_id: i64,
        full_name: String,
    },
    LinkMovieWriter {
        movie_id: MovieId,
        writer_id: i64,
    },
}

impl WriteOp {
    pub fn label(&self) -> &'static str {
        match self {
            WriteOp::UpsertMovie(_) => "upsert_movie",
            WriteOp::InsertGenre { .. } => "insert_genre",
            WriteOp::LinkMovieGenre { .. } => "link_movie_genre",
            WriteOp::InsertProducer { .. } => "insert_producer",
            WriteOp::SetPrimaryProducer { .. } => "set_primary_producer",
            WriteOp::InsertActor { .. } => "insert_actor",
            WriteOp::LinkActedIn { .. } => "link_acted_in",
            WriteOp::InsertDirector { .. } => "insert_director",
            WriteOp::LinkMovieDirector { .. } => "link_movie_director",
            WriteOp::InsertWriter { .. } => "insert_writer",
            WriteOp::LinkMovieWriter { .. } => "link_movie_writer",
        }
    }
}

/// Tables of the fixed schema, in dependency order.
pub const SCHEMA_TABLES: [&str; 10] = [
    "movie",
    "genre",
    "movie_genre",
    "producer",
    "actor",
    "acted_in",
    "director",
    "movie_director",
    "writer",
    "movie_writer",
];

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("begin transaction failed: {0}")]
    Begin(#[source] sqlx::Error),
    #[error("op #{index} ({op}) failed: {source}")]
    Statement {
        index: usize,
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("commit failed: {0}")]
    Commit(#[source] sqlx::Error),
    #[error("op #{index} ({op}) violates {constraint}")]
    Constraint {
        index: usize,
        op: &'static str,
        constraint: String,
    },
}

/// A relational store that applies one movie's ops as a single transaction:
/// all of them commit, or none are observable.
#[async_trait]
pub trait MovieStore: Send {
    async fn apply(&mut self, movie_id: MovieId, ops: &[WriteOp]) -> Result<(), WriteError>;
}
