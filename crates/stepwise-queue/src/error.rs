//! Error types for queue operations

use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur while talking to the broker
#[derive(Error, Debug)]
pub enum QueueError {
    /// Connection to the broker failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to hand a task to the broker
    #[error("Submit failed: {0}")]
    SubmitFailed(String),

    /// Failed to take a task from the broker
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Task serialization failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Task payload could not be decoded
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Invalid broker URL or settings
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend-specific error (Redis, etc.)
    #[error("Backend error: {0}")]
    BackendError(String),
}

impl QueueError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::ConnectionFailed(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            QueueError::ConnectionFailed(err.to_string())
        } else {
            QueueError::BackendError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::SerializationFailed(err.to_string())
    }
}
