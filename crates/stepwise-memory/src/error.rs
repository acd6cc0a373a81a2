//! Error types for long-term memory operations

use thiserror::Error;

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors raised by vector stores and embedding providers
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The backend cannot be used in this build or deployment
    #[error("Backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Connecting to the backend failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Reading or writing entries failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The embedding provider failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// An entry could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for MemoryError {
    fn from(err: rusqlite::Error) -> Self {
        MemoryError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for MemoryError {
    fn from(err: reqwest::Error) -> Self {
        MemoryError::Embedding(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for MemoryError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            MemoryError::ConnectionFailed(err.to_string())
        } else {
            MemoryError::Storage(err.to_string())
        }
    }
}
