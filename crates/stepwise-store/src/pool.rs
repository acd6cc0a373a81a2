//! Connection pool for SQLite with thread-safe resource management

use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{StoreError, StoreResult};

/// Configuration for SQLite connections
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub wal_mode: bool,
    pub cache_size_kb: i32,
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            cache_size_kb: 16 * 1024,
            busy_timeout_ms: 5000,
        }
    }
}

/// Fixed-size pool of SQLite connections.
///
/// A worker checks out one connection per unit of work and the
/// [`PooledConnection`] guard hands it back on drop, so a connection is
/// never held across steps.
pub struct SqlitePool {
    available_connections: Arc<Mutex<Vec<Connection>>>,
    active_connections: Arc<Mutex<usize>>,
    path: PathBuf,
    pool_size: usize,
    config: ConnectionConfig,
}

impl SqlitePool {
    /// Create a new connection pool with the specified size
    pub fn new(path: impl AsRef<Path>, pool_size: usize) -> StoreResult<Self> {
        Self::with_config(path, pool_size, ConnectionConfig::default())
    }

    /// Create a pool with explicit connection settings
    pub fn with_config(
        path: impl AsRef<Path>,
        pool_size: usize,
        config: ConnectionConfig,
    ) -> StoreResult<Self> {
        let path = Self::validate_database_path(path.as_ref())?;
        let pool_size = pool_size.max(1);

        let mut available = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            available.push(Self::create_connection(&path, &config)?);
        }

        Ok(Self {
            available_connections: Arc::new(Mutex::new(available)),
            active_connections: Arc::new(Mutex::new(0)),
            path,
            pool_size,
            config,
        })
    }

    /// Reject paths that are not plain database files
    fn validate_database_path(path: &Path) -> StoreResult<PathBuf> {
        if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(StoreError::InvalidPath(format!(
                "{}: parent directory references are not allowed",
                path.display()
            )));
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("db" | "sqlite" | "sqlite3") => Ok(path.to_path_buf()),
            Some(_) => Err(StoreError::InvalidPath(format!(
                "{}: only .db, .sqlite, and .sqlite3 files allowed",
                path.display()
            ))),
            None => Err(StoreError::InvalidPath(format!(
                "{}: file extension required",
                path.display()
            ))),
        }
    }

    /// Create a new SQLite connection with WAL mode and optimizations
    fn create_connection(path: &Path, config: &ConnectionConfig) -> StoreResult<Connection> {
        let conn = Connection::open(path).map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let cache_pragma = format!("PRAGMA cache_size = -{};", config.cache_size_kb);
        let timeout_pragma = format!("PRAGMA busy_timeout = {};", config.busy_timeout_ms);

        let mut pragmas = Vec::new();
        if config.wal_mode {
            pragmas.push("PRAGMA journal_mode = WAL;");
        }
        pragmas.push("PRAGMA synchronous = NORMAL;");
        pragmas.push(&cache_pragma);
        pragmas.push(&timeout_pragma);
        pragmas.push("PRAGMA foreign_keys = ON;");

        conn.execute_batch(&pragmas.join("\n"))
            .map_err(|e| StoreError::ConnectionFailed(format!("Failed to configure SQLite: {}", e)))?;

        Ok(conn)
    }

    fn lock_error<T>(what: &str, err: std::sync::PoisonError<T>) -> StoreError {
        StoreError::ConnectionFailed(format!("Failed to lock {}: {}", what, err))
    }

    /// Check a connection out of the pool
    pub fn acquire(&self) -> StoreResult<PooledConnection> {
        let mut active = self
            .active_connections
            .lock()
            .map_err(|e| Self::lock_error("active connection counter", e))?;

        if *active >= self.pool_size {
            return Err(StoreError::PoolExhausted {
                active: *active,
                max: self.pool_size,
            });
        }

        let pooled = {
            let mut available = self
                .available_connections
                .lock()
                .map_err(|e| Self::lock_error("connection pool", e))?;
            available.pop()
        };

        // A connection dropped after a poisoned lock is replaced lazily here
        let conn = match pooled {
            Some(conn) => conn,
            None => Self::create_connection(&self.path, &self.config)?,
        };
        *active += 1;

        Ok(PooledConnection {
            connection: Some(conn),
            pool: Arc::clone(&self.available_connections),
            active_connections: Arc::clone(&self.active_connections),
            pool_size: self.pool_size,
        })
    }

    /// Number of connections currently checked out
    pub fn active(&self) -> usize {
        self.active_connections.lock().map(|n| *n).unwrap_or(self.pool_size)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// RAII wrapper for pooled connections that returns connection to pool on drop
pub struct PooledConnection {
    connection: Option<Connection>,
    pool: Arc<Mutex<Vec<Connection>>>,
    active_connections: Arc<Mutex<usize>>,
    pool_size: usize,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("BUG: PooledConnection has None connection (this should never happen)")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("BUG: PooledConnection has None connection (this should never happen)")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.connection.take() else {
            return;
        };

        match self.active_connections.lock() {
            Ok(mut active) => *active = active.saturating_sub(1),
            Err(_) => tracing::error!("Failed to lock active connection counter on release"),
        }

        match self.pool.lock() {
            Ok(mut available) if available.len() < self.pool_size => available.push(conn),
            Ok(available) => tracing::warn!(
                available = available.len(),
                pool_size = self.pool_size,
                "Pool is full when returning connection, closing it"
            ),
            Err(_) => tracing::error!("Failed to lock pool for connection return, closing it"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unexpected_extensions() {
        assert!(matches!(
            SqlitePool::new("state.txt", 1),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            SqlitePool::new("../state.db", 1),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn connections_return_to_pool_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::new(dir.path().join("pool.db"), 2).unwrap();

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_eq!(pool.active(), 2);
        assert!(matches!(
            pool.acquire(),
            Err(StoreError::PoolExhausted { active: 2, max: 2 })
        ));

        drop(first);
        assert_eq!(pool.active(), 1);
        let third = pool.acquire().unwrap();
        third.execute_batch("SELECT 1").unwrap();

        drop(second);
        drop(third);
        assert_eq!(pool.active(), 0);
    }
}
