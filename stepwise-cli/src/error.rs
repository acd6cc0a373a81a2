use stepwise_queue::QueueError;
use stepwise_store::StoreError;
use stepwise_worker::{SettingsError, WorkerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("{0}")]
    Input(String),
}

pub type CliResult<T> = Result<T, CliError>;
