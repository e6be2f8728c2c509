use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use cine_harvest::cli::collect::{self, CollectConfig};
use cine_harvest::cli::db_counts::{self, DbCountsConfig};
use cine_harvest::cli::ingest::{self, IngestConfig};
use cine_harvest::database_ops::tmdb::strategy::CollectionProfile;
use cine_harvest::database_ops::tmdb::MovieId;
use cine_harvest::logging::init_tracing;
use cine_harvest::util::env::{self, DATABASE_URL_KEY, TMDB_TOKEN_KEY};

#[derive(Parser, Debug)]
#[command(name = "cine", version, about = "TMDB movie collection and ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Collect candidate movie ids and write the batch hand-off file
    Collect {
        #[arg(long, value_enum, default_value_t = CollectionProfile::Brazilian)]
        profile: CollectionProfile,
        /// Number of distinct movies to collect (defaults per profile)
        #[arg(long)]
        target: Option<usize>,
        /// Ids per batch in the hand-off file (defaults per profile)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Output path (default: <profile>_movies.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fetch, normalize and write movies into the relational store
    Ingest {
        /// Hand-off file produced by `collect`
        #[arg(long, conflicts_with = "ids")]
        input: Option<PathBuf>,
        /// Comma-separated movie ids
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<MovieId>>,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Pause between batches in milliseconds
        #[arg(long)]
        pause_ms: Option<u64>,
        #[arg(long)]
        schema: Option<String>,
        /// Write into an in-memory store and print its row counts
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Print row counts for the movie schema tables
    DbCounts {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        #[arg(long)]
        schema: Option<String>,
    },
    /// Check that the required credentials are present
    CheckEnv,
}

const OPTIONAL_KEYS: [&str; 6] = [
    "TMDB_BASE_URL",
    "TMDB_TIMEOUT_SECS",
    "MOVIES_SCHEMA",
    "INGEST_BATCH_SIZE",
    "INGEST_BATCH_PAUSE_MS",
    "USE_PREPARED",
];

#[tokio::main]
async fn main() -> Result<()> {
    env::init_env();
    init_tracing("info,sqlx=warn")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Collect {
            profile,
            target,
            batch_size,
            out,
        } => {
            env::preflight_check("collect", &[TMDB_TOKEN_KEY], &OPTIONAL_KEYS)?;
            collect::run(CollectConfig {
                profile,
                target,
                batch_size,
                out,
            })
            .await?;
        }
        Commands::Ingest {
            input,
            ids,
            batch_size,
            pause_ms,
            schema,
            dry_run,
        } => {
            let required: &[&str] = if dry_run {
                &[TMDB_TOKEN_KEY]
            } else {
                &[TMDB_TOKEN_KEY, DATABASE_URL_KEY]
            };
            env::preflight_check("ingest", required, &OPTIONAL_KEYS)?;
            ingest::run(IngestConfig {
                input,
                ids,
                batch_size,
                pause_ms,
                schema,
                dry_run,
            })
            .await?;
        }
        Commands::DbCounts { db_url, schema } => {
            db_counts::run(DbCountsConfig {
                database_url: db_url,
                schema,
            })
            .await?;
        }
        Commands::CheckEnv => {
            env::preflight_check("check-env", &[TMDB_TOKEN_KEY, DATABASE_URL_KEY], &OPTIONAL_KEYS)?;
            info!("environment looks good");
        }
    }
    Ok(())
}
