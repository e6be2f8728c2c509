use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tracing::{debug, instrument, warn};

use crate::database_ops::db::{validate_schema_name, Db};
use crate::database_ops::tmdb::models::MovieId;
use crate::database_ops::write_ops::{MovieStore, WriteError, WriteOp, SCHEMA_TABLES};

pub const DEFAULT_SCHEMA: &str = "movies_data";

const UPSERT_MOVIE: &str = "INSERT INTO movie (movie_id, title, release_date, duration_minutes, rating, synopsis, overview, adult, budget, revenue, tagline) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
     ON CONFLICT (movie_id) DO UPDATE SET \
         title = EXCLUDED.title, \
         release_date = EXCLUDED.release_date, \
         duration_minutes = EXCLUDED.duration_minutes, \
         rating = EXCLUDED.rating, \
         synopsis = EXCLUDED.synopsis, \
         overview = EXCLUDED.overview, \
         adult = EXCLUDED.adult, \
         budget = EXCLUDED.budget, \
         revenue = EXCLUDED.revenue, \
         tagline = EXCLUDED.tagline";

/// Postgres writer: one transaction per movie on the run's single connection,
/// with `search_path` pinned to the schema namespace for that transaction.
pub struct PgStore {
    db: Db,
    schema: String,
}

impl PgStore {
    /// Fails when the schema name is not a plain identifier or any schema table is missing.
    pub async fn open(mut db: Db, schema: &str) -> Result<Self> {
        validate_schema_name(schema)?;
        let missing = db.missing_tables(schema, &SCHEMA_TABLES).await?;
        if !missing.is_empty() {
            bail!("schema {schema} is missing tables: {}", missing.join(", "));
        }
        Ok(Self {
            db,
            schema: schema.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn into_db(self) -> Db {
        self.db
    }
}

async fn execute_op(conn: &mut PgConnection, op: &WriteOp) -> Result<(), sqlx::Error> {
    match op {
        WriteOp::UpsertMovie(row) => {
            sqlx::query(UPSERT_MOVIE)
                .persistent(false)
                .bind(row.movie_id)
                .bind(&row.title)
                .bind(row.release_date)
                .bind(row.duration_minutes)
                .bind(row.rating)
                .bind(&row.synopsis)
                .bind(&row.overview)
                .bind(row.adult)
                .bind(row.budget)
                .bind(row.revenue)
                .bind(&row.tagline)
                .execute(&mut *conn)
                .await?;
        }
        WriteOp::InsertGenre {
            genre_id,
            genre_name,
        } => {
            sqlx::query(
                "INSERT INTO genre (genre_id, genre_name) VALUES ($1, $2) \
                 ON CONFLICT (genre_id) DO NOTHING",
            )
            .persistent(false)
            .bind(genre_id)
            .bind(genre_name)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::LinkMovieGenre { movie_id, genre_id } => {
            sqlx::query(
                "INSERT INTO movie_genre (movie_id, genre_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .persistent(false)
            .bind(movie_id)
            .bind(genre_id)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::InsertProducer {
            producer_id,
            company_name,
            origin_country,
        } => {
            sqlx::query(
                "INSERT INTO producer (producer_id, company_name, origin_country) VALUES ($1, $2, $3) \
                 ON CONFLICT (producer_id) DO NOTHING",
            )
            .persistent(false)
            .bind(producer_id)
            .bind(company_name)
            .bind(origin_country)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::SetPrimaryProducer {
            movie_id,
            producer_id,
        } => {
            sqlx::query("UPDATE movie SET producer_id = $1 WHERE movie_id = $2")
                .persistent(false)
                .bind(producer_id)
                .bind(movie_id)
                .execute(&mut *conn)
                .await?;
        }
        WriteOp::InsertActor { actor_id, name } => {
            sqlx::query(
                "INSERT INTO actor (actor_id, name) VALUES ($1, $2) ON CONFLICT (actor_id) DO NOTHING",
            )
            .persistent(false)
            .bind(actor_id)
            .bind(name)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::LinkActedIn { movie_id, actor_id } => {
            sqlx::query(
                "INSERT INTO acted_in (movie_id, actor_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .persistent(false)
            .bind(movie_id)
            .bind(actor_id)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::InsertDirector {
            director_id,
            full_name,
        } => {
            sqlx::query(
                "INSERT INTO director (director_id, full_name) VALUES ($1, $2) \
                 ON CONFLICT (director_id) DO NOTHING",
            )
            .persistent(false)
            .bind(director_id)
            .bind(full_name)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::LinkMovieDirector {
            movie_id,
            director_id,
        } => {
            sqlx::query(
                "INSERT INTO movie_director (movie_id, director_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .persistent(false)
            .bind(movie_id)
            .bind(director_id)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::InsertWriter {
            writer_id,
            full_name,
        } => {
            sqlx::query(
                "INSERT INTO writer (writer_id, full_name) VALUES ($1, $2) \
                 ON CONFLICT (writer_id) DO NOTHING",
            )
            .persistent(false)
            .bind(writer_id)
            .bind(full_name)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::LinkMovieWriter {
            movie_id,
            writer_id,
        } => {
            sqlx::query(
                "INSERT INTO movie_writer (movie_id, writer_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .persistent(false)
            .bind(movie_id)
            .bind(writer_id)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl MovieStore for PgStore {
    #[instrument(skip(self, ops), fields(ops = ops.len()))]
    async fn apply(&mut self, movie_id: MovieId, ops: &[WriteOp]) -> Result<(), WriteError> {
        let mut tx = self.db.conn.begin().await.map_err(WriteError::Begin)?;

        // SET LOCAL reverts at commit/rollback; the name was validated in `open`.
        let set_path = format!("SET LOCAL search_path TO {}", self.schema);
        if let Err(source) = sqlx::query(&set_path)
            .persistent(false)
            .execute(&mut *tx)
            .await
        {
            if let Err(rb) = tx.rollback().await {
                warn!(movie_id, error = %rb, "rollback failed; connection state unknown");
            }
            return Err(WriteError::Begin(source));
        }

        for (index, op) in ops.iter().enumerate() {
            if let Err(source) = execute_op(&mut *tx, op).await {
                if let Err(rb) = tx.rollback().await {
                    warn!(movie_id, error = %rb, "rollback failed; connection state unknown");
                }
                return Err(WriteError::Statement {
                    index,
                    op: op.label(),
                    source,
                });
            }
        }

        tx.commit().await.map_err(WriteError::Commit)?;
        debug!(movie_id, ops = ops.len(), "movie batch committed");
        Ok(())
    }
}
