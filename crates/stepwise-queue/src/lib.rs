//! # Stepwise Queue
//!
//! Distributed task queue carrying `execute_agent` units of work from the
//! scheduler to worker processes.
//!
//! ## Backends
//!
//! - **Redis** (`redis://`, `rediss://`): ready list, delayed and in-flight
//!   sorted sets and a dead-letter list per queue name. Requires the `redis`
//!   feature.
//!
//! Received messages must be acknowledged with [`TaskBroker::ack`]; an
//! unacknowledged message is redelivered once its visibility timeout passes.
//! - **In-memory** (`memory://`): single process, used by tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use stepwise_core::ExecutionId;
//! use stepwise_queue::{TaskBroker, TaskMessage, connect};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = connect("memory://", "stepwise", Duration::from_secs(600)).await?;
//! broker
//!     .submit(TaskMessage::execute_agent(ExecutionId::new(1), 0), Duration::from_secs(10))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod error;
pub mod memory;
pub mod retry;
pub mod task;

#[cfg(feature = "redis")]
pub mod redis;

pub use broker::{QueueDepth, TaskBroker};
pub use error::{QueueError, QueueResult};
pub use memory::{DEFAULT_VISIBILITY_TIMEOUT, InMemoryBroker, Submission};
pub use retry::RetryPolicy;
pub use task::{EXECUTE_AGENT_TASK, TaskMessage};

#[cfg(feature = "redis")]
pub use redis::{RedisBroker, RedisConfig};

use std::sync::Arc;
use std::time::Duration;

/// Open the broker a URL points at. Messages received from it are
/// redelivered when not acknowledged within `visibility_timeout`.
pub async fn connect(url: &str, queue_name: &str, visibility_timeout: Duration) -> QueueResult<Arc<dyn TaskBroker>> {
    let scheme = url.split_once("://").map(|(scheme, _)| scheme).unwrap_or_default();
    match scheme {
        "memory" => Ok(Arc::new(InMemoryBroker::new().with_visibility_timeout(visibility_timeout))),
        #[cfg(feature = "redis")]
        "redis" | "rediss" => {
            let config = RedisConfig::new(url)
                .with_queue_name(queue_name)
                .with_visibility_timeout(visibility_timeout);
            Ok(Arc::new(RedisBroker::with_config(config).await?))
        }
        #[cfg(not(feature = "redis"))]
        "redis" | "rediss" => {
            let _ = (queue_name, visibility_timeout);
            Err(QueueError::InvalidConfig(
                "redis broker requested but the `redis` feature is disabled".to_string(),
            ))
        }
        _ => Err(QueueError::InvalidConfig(format!(
            "unsupported broker URL scheme in '{}'",
            url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_to_in_memory_broker() {
        let broker = connect("memory://", "stepwise", DEFAULT_VISIBILITY_TIMEOUT).await.unwrap();
        assert_eq!(broker.describe(), "memory://");
    }

    #[tokio::test]
    async fn rejects_unknown_schemes() {
        let err = connect("amqp://localhost", "stepwise", DEFAULT_VISIBILITY_TIMEOUT).await.err().unwrap();
        assert!(matches!(err, QueueError::InvalidConfig(_)));
    }
}
