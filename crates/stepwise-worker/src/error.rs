//! Error types for the worker

use stepwise_queue::QueueError;
use stepwise_store::StoreError;
use thiserror::Error;

use crate::settings::SettingsError;

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Failures of the worker itself, as opposed to failures of a step.
///
/// Step failures are persisted on the execution and never surface here.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Execution {0} not found")]
    ExecutionNotFound(i64),
}
