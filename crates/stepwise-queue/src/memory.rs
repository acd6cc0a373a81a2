//! In-process broker.
//!
//! Used by tests and single-process deployments (`memory://`). Messages live
//! only as long as the process; unacknowledged ones are redelivered after
//! the visibility timeout like on the Redis broker.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::broker::{QueueDepth, TaskBroker};
use crate::error::{QueueError, QueueResult};
use crate::task::TaskMessage;

/// A submission as the broker saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub message: TaskMessage,
    pub delay: Duration,
}

/// How long a received message may stay unacknowledged by default.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Default)]
struct State {
    ready: VecDeque<TaskMessage>,
    delayed: Vec<(Instant, TaskMessage)>,
    in_flight: Vec<(Instant, TaskMessage)>,
    history: Vec<Submission>,
}

impl State {
    /// Move every due delayed message to the ready queue, earliest first,
    /// after redelivering in-flight messages whose visibility expired.
    fn promote(&mut self, now: Instant) {
        let (expired, in_flight): (Vec<_>, Vec<_>) =
            self.in_flight.drain(..).partition(|(deadline, _)| *deadline <= now);
        self.in_flight = in_flight;
        for (_, message) in expired.into_iter().rev() {
            self.ready.push_front(message);
        }

        if self.delayed.is_empty() {
            return;
        }
        self.delayed.sort_by_key(|(due, _)| *due);
        let due_count = self.delayed.iter().take_while(|(due, _)| *due <= now).count();
        for (_, message) in self.delayed.drain(..due_count) {
            self.ready.push_back(message);
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.delayed
            .iter()
            .chain(self.in_flight.iter())
            .map(|(due, _)| *due)
            .min()
    }
}

pub struct InMemoryBroker {
    state: Mutex<State>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            notify: Notify::new(),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| QueueError::BackendError(format!("in-memory broker lock poisoned: {}", e)))
    }

    /// Every submission accepted so far, in submission order.
    pub fn history(&self) -> Vec<Submission> {
        self.lock().map(|state| state.history.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TaskBroker for InMemoryBroker {
    async fn submit(&self, message: TaskMessage, delay: Duration) -> QueueResult<()> {
        {
            let mut state = self.lock()?;
            state.history.push(Submission {
                message: message.clone(),
                delay,
            });
            if delay.is_zero() {
                state.ready.push_back(message);
            } else {
                state.delayed.push((Instant::now() + delay, message));
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> QueueResult<Option<TaskMessage>> {
        let deadline = Instant::now() + timeout;
        loop {
            let next_due = {
                let mut state = self.lock()?;
                let now = Instant::now();
                state.promote(now);
                if let Some(message) = state.ready.pop_front() {
                    state.in_flight.push((now + self.visibility_timeout, message.clone()));
                    return Ok(Some(message));
                }
                state.next_due()
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }
            let wake_at = next_due.map_or(deadline, |due| due.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, self.notify.notified()).await;
        }
    }

    async fn ack(&self, message: &TaskMessage) -> QueueResult<()> {
        self.lock()?.in_flight.retain(|(_, held)| held.id != message.id);
        Ok(())
    }

    async fn depth(&self) -> QueueResult<QueueDepth> {
        let state = self.lock()?;
        Ok(QueueDepth {
            ready: state.ready.len(),
            delayed: state.delayed.len(),
            in_flight: state.in_flight.len(),
            dead: 0,
        })
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::ExecutionId;

    #[tokio::test]
    async fn delivers_in_submission_order() {
        let broker = InMemoryBroker::new();
        for id in 1..=3 {
            broker
                .submit(TaskMessage::execute_agent(ExecutionId::new(id), 0), Duration::ZERO)
                .await
                .unwrap();
        }
        for id in 1..=3 {
            let message = broker.receive(Duration::from_millis(10)).await.unwrap().unwrap();
            assert_eq!(message.execution_id().unwrap(), ExecutionId::new(id));
        }
        assert!(broker.receive(Duration::from_millis(10)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_messages_wait_for_their_delay() {
        let broker = InMemoryBroker::new();
        broker
            .submit(TaskMessage::execute_agent(ExecutionId::new(1), 0), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(broker.receive(Duration::from_secs(5)).await.unwrap().is_none());
        assert_eq!(broker.depth().await.unwrap().delayed, 1);

        let message = broker.receive(Duration::from_secs(30)).await.unwrap().unwrap();
        assert_eq!(message.execution_id().unwrap(), ExecutionId::new(1));
        assert_eq!(broker.history()[0].delay, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn receive_wakes_on_submit() {
        let broker = std::sync::Arc::new(InMemoryBroker::new());
        let receiver = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.receive(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        broker
            .submit(TaskMessage::execute_agent(ExecutionId::new(9), 0), Duration::ZERO)
            .await
            .unwrap();
        let message = receiver.await.unwrap().unwrap().unwrap();
        assert_eq!(message.execution_id().unwrap(), ExecutionId::new(9));
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_messages_are_redelivered() {
        let broker = InMemoryBroker::new().with_visibility_timeout(Duration::from_secs(60));
        broker
            .submit(TaskMessage::execute_agent(ExecutionId::new(3), 0), Duration::ZERO)
            .await
            .unwrap();

        let first = broker.receive(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(broker.depth().await.unwrap().in_flight, 1);
        assert!(broker.receive(Duration::from_secs(30)).await.unwrap().is_none());

        let again = broker.receive(Duration::from_secs(60)).await.unwrap().unwrap();
        assert_eq!(again.id, first.id);

        broker.ack(&again).await.unwrap();
        assert_eq!(broker.depth().await.unwrap(), QueueDepth::default());
        assert!(broker.receive(Duration::from_secs(120)).await.unwrap().is_none());
    }
}
