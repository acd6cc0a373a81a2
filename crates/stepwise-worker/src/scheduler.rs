//! Hands units of work to the broker.

use std::sync::Arc;
use std::time::Duration;
use stepwise_core::{ExecutionId, UnitOfWork};
use stepwise_queue::{QueueResult, TaskBroker, TaskMessage};
use tracing::info;

/// Enqueues `execute_agent` units of work.
///
/// Submission returns once the broker accepted the message; it never waits
/// for the step to run. Transient broker failures are retried by the broker
/// client, not here.
#[derive(Clone)]
pub struct ExecutionScheduler {
    broker: Arc<dyn TaskBroker>,
}

impl ExecutionScheduler {
    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<dyn TaskBroker> {
        &self.broker
    }

    /// Enqueue step `step` of an execution, i.e. the step that runs once
    /// `step` steps have completed.
    pub async fn enqueue(&self, execution_id: ExecutionId, step: u32, delay: Duration) -> QueueResult<()> {
        self.broker
            .submit(TaskMessage::execute_agent(execution_id, step), delay)
            .await?;
        info!(
            execution_id = %execution_id,
            step,
            delay_secs = delay.as_secs_f64(),
            "Execution step enqueued"
        );
        Ok(())
    }

    pub async fn schedule(&self, unit: UnitOfWork) -> QueueResult<()> {
        self.enqueue(unit.execution_id, unit.step, unit.delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_queue::InMemoryBroker;

    #[tokio::test]
    async fn enqueue_submits_execute_agent_with_delay() {
        let broker = Arc::new(InMemoryBroker::new());
        let scheduler = ExecutionScheduler::new(broker.clone());

        scheduler.enqueue(ExecutionId::new(7), 2, Duration::from_secs(10)).await.unwrap();
        scheduler.schedule(UnitOfWork::immediate(ExecutionId::new(8), 0)).await.unwrap();

        let history = broker.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message.unit().unwrap(), (ExecutionId::new(7), 2));
        assert_eq!(history[0].delay, Duration::from_secs(10));
        assert_eq!(history[1].message.unit().unwrap(), (ExecutionId::new(8), 0));
        assert_eq!(history[1].delay, Duration::ZERO);
    }
}
