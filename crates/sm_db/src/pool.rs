//! Pool construction and the pragmas the catalog depends on.
//!
//! Two pools share one SQLite file: a single-connection writer pool (every
//! mutating catalog call funnels through the Job Manager onto this one
//! connection, so there is never a write-write race to arbitrate) and a
//! multi-connection reader pool the HTTP API uses so API reads never queue
//! behind an in-flight pipeline write. WAL mode makes the split safe: readers
//! see the last committed snapshot without blocking on the writer.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;

const BUSY_TIMEOUT_MS: u32 = 5_000;
const READER_MAX_CONNECTIONS: u32 = 4;

/// The two pools the catalog hands out: one writer, one reader.
#[derive(Clone)]
pub struct CatalogPools {
    pub writer: SqlitePool,
    pub reader: SqlitePool,
}

fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS as u64))
}

pub async fn open(db_path: &Path) -> Result<CatalogPools> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            sqlx::Error::Io(e)
        })?;
    }

    let options = connect_options(db_path);

    let writer = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone())
        .await?;

    let reader = SqlitePoolOptions::new()
        .max_connections(READER_MAX_CONNECTIONS)
        .connect_with(options.read_only(false))
        .await?;

    info!(path = %db_path.display(), "opened catalog database");

    Ok(CatalogPools { writer, reader })
}

#[cfg(test)]
pub async fn open_memory() -> Result<CatalogPools> {
    let writer = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let reader = writer.clone();
    Ok(CatalogPools { writer, reader })
}
