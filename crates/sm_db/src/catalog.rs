use std::path::Path;

use sqlx::SqlitePool;

use crate::error::Result;
use crate::pool::{self, CatalogPools};
use crate::schema;

/// Handle to the embedded catalog database. Cheap to clone (wraps two
/// `sqlx::SqlitePool`s internally); the daemon holds one instance for its
/// whole lifetime.
#[derive(Clone)]
pub struct Catalog {
    pools: CatalogPools,
}

impl Catalog {
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pools = pool::open(db_path).await?;
        schema::ensure_schema(&pools.writer).await?;
        Ok(Catalog { pools })
    }

    #[cfg(test)]
    pub async fn open_memory() -> Result<Self> {
        let pools = pool::open_memory().await?;
        schema::ensure_schema(&pools.writer).await?;
        Ok(Catalog { pools })
    }

    /// The single-connection pool every mutating call goes through.
    pub fn writer(&self) -> &SqlitePool {
        &self.pools.writer
    }

    /// The multi-connection pool the HTTP API reads through.
    pub fn reader(&self) -> &SqlitePool {
        &self.pools.reader
    }
}
