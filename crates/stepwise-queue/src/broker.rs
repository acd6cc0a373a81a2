//! Broker contract.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::QueueResult;
use crate::task::TaskMessage;

/// Queue sizes reported by a broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepth {
    /// Ready to be received now
    pub ready: usize,
    /// Waiting for their delay to elapse
    pub delayed: usize,
    /// Received but not yet acknowledged
    pub in_flight: usize,
    /// Payloads that could not be decoded
    pub dead: usize,
}

/// A message broker holding task messages for worker processes.
///
/// Delivery is at-least-once and unordered across executions. A received
/// message stays in flight until it is acknowledged; one that is not
/// acknowledged within the broker's visibility timeout becomes receivable
/// again. Submission returns once the broker has accepted the message.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Hand a task to the broker, to become receivable after `delay`.
    async fn submit(&self, message: TaskMessage, delay: Duration) -> QueueResult<()>;

    /// Wait up to `timeout` for the next ready task.
    async fn receive(&self, timeout: Duration) -> QueueResult<Option<TaskMessage>>;

    /// Mark a received task as handled so it is never redelivered.
    /// Acknowledging an unknown or already acknowledged task is a no-op.
    async fn ack(&self, message: &TaskMessage) -> QueueResult<()>;

    /// Current queue sizes.
    async fn depth(&self) -> QueueResult<QueueDepth>;

    /// Short description for logs, never including credentials.
    fn describe(&self) -> String;
}
