//! The long-running worker process.

use std::sync::Arc;
use stepwise_worker::{WorkerBuilder, WorkerSettings};
use tracing::{info, warn};

use crate::error::CliResult;

pub async fn run_worker(settings: WorkerSettings) -> CliResult<()> {
    let concurrency = settings.concurrency;
    let receive_timeout = settings.receive_timeout;
    info!(
        database = %settings.database_path.display(),
        broker = %settings.broker_url,
        queue = %settings.queue_name,
        "Starting worker"
    );

    let worker = Arc::new(WorkerBuilder::new(settings).build().await?);
    worker.run(concurrency, receive_timeout, shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C, stopping now");
    }
}
