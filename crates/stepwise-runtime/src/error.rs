//! Error types for runtime steps

use stepwise_memory::MemoryError;
use thiserror::Error;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that end a runtime step
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No usable model binding could be built
    #[error("Model configuration error: {0}")]
    ModelConfig(String),

    /// The request to the model never produced a response
    #[error("Model request failed: {0}")]
    ModelRequest(String),

    /// The model endpoint answered with an error status
    #[error("Model returned status {status}: {body}")]
    ModelStatus { status: u16, body: String },

    /// The model reply does not contain a command
    #[error("Invalid model reply: {0}")]
    InvalidReply(String),

    /// Long-term memory failed where the step cannot do without it
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    /// A tool call aborted instead of returning a result
    #[error("Tool '{tool}' aborted: {reason}")]
    ToolAborted { tool: String, reason: String },

    /// Failure raised by a custom runtime
    #[error("{0}")]
    Other(String),
}

impl RuntimeError {
    pub fn other(message: impl Into<String>) -> Self {
        RuntimeError::Other(message.into())
    }
}

impl From<reqwest::Error> for RuntimeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RuntimeError::InvalidReply(err.to_string())
        } else {
            RuntimeError::ModelRequest(err.to_string())
        }
    }
}
