use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;
use std::str::FromStr;
use tracing::{info, instrument, warn};

use crate::util::env as env_util;

/// The run's single database connection. Acquired once, closed at run end;
/// dropping it without `close` still releases the socket.
pub struct Db {
    pub conn: PgConnection,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let use_prepared = env_util::env_flag("USE_PREPARED", false);
        let mut connect_options = PgConnectOptions::from_str(database_url)
            .context("DATABASE_URL is not a valid postgres connection string")?;

        // Ensure TLS is enabled when DSN contains sslmode=require
        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !use_prepared {
            // PgBouncer txn mode safe (Neon pooler)
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let conn = PgConnection::connect_with(&connect_options)
            .await
            .context("database connection failed")?;
        info!("connected to db");
        Ok(Self { conn })
    }

    pub async fn close(self) {
        if let Err(err) = self.conn.close().await {
            warn!(error = %err, "closing database connection failed");
        } else {
            info!("database connection closed");
        }
    }

    /// Tables from `tables` that do not exist under `schema`.
    pub async fn missing_tables(&mut self, schema: &str, tables: &[&str]) -> Result<Vec<String>> {
        let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        let present: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = $1 AND table_name = ANY($2)",
        )
        .persistent(false)
        .bind(schema)
        .bind(&names)
        .fetch_all(&mut self.conn)
        .await?;
        Ok(names
            .into_iter()
            .filter(|t| !present.contains(t))
            .collect())
    }
}

/// Schema names are interpolated into `SET search_path` unquoted (so Postgres folds
/// them to lowercase) and also compared verbatim against information_schema. Only
/// plain lowercase identifiers satisfy both.
pub fn validate_schema_name(schema: &str) -> Result<()> {
    let mut chars = schema.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };
    if !valid || schema.len() > 63 {
        anyhow::bail!("invalid schema name {schema:?}: expected a lowercase SQL identifier");
    }
    Ok(())
}
