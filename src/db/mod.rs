//! SQLite store
//!
//! A pooled rusqlite handle with one query module per concern. SQLite is
//! single-writer; the pool serializes writes while reads stay concurrent.
//! Multi-row mutations (merge, archive, filter upserts) run in explicit
//! transactions.

mod conversations;
mod emails;
mod filters;
mod metrics;
pub mod models;
mod schema;
mod sync_state;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::error::JobError;

pub use filters::AUTO_BLACKLIST_THRESHOLD;
pub use metrics::MetricField;
pub use models::*;

/// Connection pool type used throughout the store.
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Handle to the conversation store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database at `path` and run the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path);
        Self::build(manager)
    }

    /// In-memory database for tests. A single shared connection keeps the
    /// schema visible to every checkout.
    pub fn in_memory() -> Result<Self, JobError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let db = Self { pool };
        db.configure()?;
        Ok(db)
    }

    fn build(manager: SqliteConnectionManager) -> Result<Self, JobError> {
        let pool = Pool::builder().max_size(8).build(manager)?;
        let db = Self { pool };
        db.configure()?;
        Ok(db)
    }

    fn configure(&self) -> Result<(), JobError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;
        schema::initialize(&conn)?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<DbConnection, JobError> {
        Ok(self.pool.get()?)
    }

    /// Connectivity check.
    pub fn health(&self) -> Result<(), JobError> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}
