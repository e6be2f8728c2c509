use anyhow::{Context, Result};
use std::fmt::Write as _;

use crate::database_ops::db::{validate_schema_name, Db};
use crate::database_ops::pg_store::DEFAULT_SCHEMA;
use crate::database_ops::write_ops::SCHEMA_TABLES;
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct DbCountsConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    /// Schema to count in (defaults to env MOVIES_SCHEMA or `movies_data`).
    pub schema: Option<String>,
}

fn is_undefined_table_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("42P01"),
        _ => false,
    }
}

/// Row counts of the movie schema; tables that do not exist count as zero.
pub async fn counts(db: &mut Db, schema: &str) -> Result<Vec<(&'static str, i64)>> {
    validate_schema_name(schema)?;
    let mut out = Vec::with_capacity(SCHEMA_TABLES.len());
    for table in SCHEMA_TABLES {
        let sql = format!("SELECT count(*) FROM {schema}.{table}");
        let n = match sqlx::query_scalar::<_, i64>(&sql)
            .persistent(false)
            .fetch_one(&mut db.conn)
            .await
        {
            Ok(val) => val,
            Err(e) if is_undefined_table_error(&e) => 0,
            Err(e) => return Err(e).with_context(|| format!("counting {schema}.{table}")),
        };
        out.push((table, n));
    }
    Ok(out)
}

pub async fn run(cfg: DbCountsConfig) -> Result<()> {
    env_util::init_env();
    let db_url = match cfg.database_url {
        Some(url) => url,
        None => env_util::db_url()?,
    };
    let schema = cfg
        .schema
        .or_else(|| env_util::env_opt("MOVIES_SCHEMA"))
        .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());

    let mut db = Db::connect(&db_url).await?;
    let result = counts(&mut db, &schema).await;
    db.close().await;

    let mut out = String::new();
    writeln!(out, "DB COUNTS SUMMARY ({schema}):").ok();
    for (table, n) in result? {
        writeln!(out, "{table}: {n}").ok();
    }
    println!("{}", out);
    Ok(())
}
