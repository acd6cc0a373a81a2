//! Entry point of the relational store.

use std::path::Path;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::migration::MigrationEngine;
use crate::pool::SqlitePool;
use crate::session::StoreSession;

/// Default number of pooled connections
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Shared handle to the SQLite store.
///
/// Cloning is cheap. Each unit of work opens its own [`StoreSession`] and
/// drops it when done.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
    migrations: Arc<MigrationEngine>,
}

impl SqliteStore {
    /// Open the store and bring its schema up to date
    pub fn open(path: impl AsRef<Path>, pool_size: usize) -> StoreResult<Self> {
        let store = Self::open_unmigrated(path, pool_size)?;
        store.migrate()?;
        Ok(store)
    }

    /// Open the store without touching its schema
    pub fn open_unmigrated(path: impl AsRef<Path>, pool_size: usize) -> StoreResult<Self> {
        Ok(Self {
            pool: Arc::new(SqlitePool::new(path, pool_size)?),
            migrations: Arc::new(MigrationEngine::new()),
        })
    }

    /// Apply pending schema migrations, returning how many ran
    pub fn migrate(&self) -> StoreResult<usize> {
        let conn = self.pool.acquire()?;
        self.migrations.migrate(&conn, None)
    }

    /// Schema version recorded in the database
    pub fn schema_version(&self) -> StoreResult<u32> {
        let conn = self.pool.acquire()?;
        self.migrations.current_version(&conn)
    }

    /// Check out a connection for one unit of work
    pub fn session(&self) -> StoreResult<StoreSession> {
        Ok(StoreSession::new(self.pool.acquire()?))
    }

    /// Connections currently checked out
    pub fn active_sessions(&self) -> usize {
        self.pool.active()
    }
}
