//! Error types for store operations

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the relational store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Opening or configuring a connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Every pooled connection is checked out
    #[error("Connection pool exhausted: {active} active connections (max: {max})")]
    PoolExhausted { active: usize, max: usize },

    /// The database path was rejected before opening
    #[error("Invalid database path: {0}")]
    InvalidPath(String),

    /// A schema migration could not be applied
    #[error("Migration {version} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    /// A statement failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A stored value could not be decoded
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}
