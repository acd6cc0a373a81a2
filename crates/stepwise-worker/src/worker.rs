//! Queue consumer driving one pipeline pass per unit of work.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stepwise_core::{
    AgentExecution, ErrorKind, ExecutionId, ExecutionStatus, PipelineError, PipelineResult, StepOutcome,
};
use stepwise_queue::TaskMessage;
use stepwise_store::{SqliteStore, StoreSession};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::WorkerResult;
use crate::pipeline::{PreparedStep, StepPipeline, store_error};
use crate::scheduler::ExecutionScheduler;

/// What handling one unit of work did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The step ran and the next one was enqueued.
    Continued { delay: Duration },
    /// The step completed the execution.
    Completed,
    /// The step failed; the execution is `FAILED` with this kind.
    Failed(ErrorKind),
    /// The execution was not runnable; nothing ran.
    Skipped(ExecutionStatus),
    /// The unit's step was already run by another delivery; nothing ran
    /// or the result was discarded.
    Stale { steps_completed: u32 },
    /// Another delivery holds the step lease; nothing ran.
    LeaseHeld,
    /// No execution with this id exists.
    UnknownExecution,
}

enum Loaded {
    Ready(PreparedStep),
    Stopped(ExecutionStatus),
}

/// Consumes `execute_agent` units of work.
///
/// A unit names the step it is for. Claiming the step lease succeeds only
/// while the execution's step counter still matches, so a redelivered or
/// duplicated unit can neither run a step concurrently nor run it twice.
/// Store sessions are opened per phase and released before the runtime is
/// invoked.
pub struct TaskWorker {
    store: SqliteStore,
    scheduler: ExecutionScheduler,
    pipeline: Arc<StepPipeline>,
    step_delay: Duration,
    lease_ttl: Duration,
}

impl TaskWorker {
    pub fn new(store: SqliteStore, scheduler: ExecutionScheduler, pipeline: Arc<StepPipeline>) -> Self {
        Self {
            store,
            scheduler,
            pipeline,
            step_delay: Duration::from_secs(10),
            lease_ttl: Duration::from_secs(600),
        }
    }

    /// Delay between steps for agents without an `iteration_interval`.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    pub fn scheduler(&self) -> &ExecutionScheduler {
        &self.scheduler
    }

    /// Decode a broker message and process it.
    ///
    /// Undecodable messages are logged and dropped.
    pub async fn handle(&self, message: &TaskMessage) -> WorkerResult<Option<ProcessOutcome>> {
        let (execution_id, step) = match message.unit() {
            Ok(unit) => unit,
            Err(e) => {
                error!(task_id = %message.id, task = %message.task, error = %e, "Dropping undecodable task");
                return Ok(None);
            }
        };
        let span = info_span!("execute_agent", execution_id = %execution_id, step, task_id = %message.id);
        self.process(execution_id, step).instrument(span).await.map(Some)
    }

    /// Handle a received message and acknowledge it once its unit is
    /// settled.
    ///
    /// A unit that could not run because its lease is held, or whose
    /// handling failed before anything was persisted, is left
    /// unacknowledged so the broker redelivers it.
    pub async fn consume(&self, message: TaskMessage) -> WorkerResult<Option<ProcessOutcome>> {
        let handled = self.handle(&message).await;
        if matches!(handled, Err(_) | Ok(Some(ProcessOutcome::LeaseHeld))) {
            return handled;
        }
        if let Err(e) = self.scheduler.broker().ack(&message).await {
            warn!(task_id = %message.id, error = %e, "Failed to acknowledge task");
        }
        handled
    }

    /// Run step `step` of `execution_id`, unless it already ran.
    ///
    /// # Errors
    ///
    /// Only store or broker failures that leave nothing persisted are
    /// returned; step failures are recorded on the execution.
    pub async fn process(&self, execution_id: ExecutionId, step: u32) -> WorkerResult<ProcessOutcome> {
        let owner = Uuid::new_v4().to_string();
        let execution = {
            let session = self.store.session()?;
            let Some(execution) = session.get_execution(execution_id)? else {
                warn!(execution_id = %execution_id, "Unit of work for unknown execution dropped");
                return Ok(ProcessOutcome::UnknownExecution);
            };
            if let Some(outcome) = Self::unclaimable(&execution, step) {
                return Ok(outcome);
            }
            if !session.claim_lease(execution_id, step, &owner, self.lease_ttl)? {
                // The execution may have moved on between the read and the claim
                let current = session.get_execution(execution_id)?.unwrap_or(execution);
                if let Some(outcome) = Self::unclaimable(&current, step) {
                    return Ok(outcome);
                }
                info!(execution_id = %execution_id, "Step lease held elsewhere, leaving unit for redelivery");
                return Ok(ProcessOutcome::LeaseHeld);
            }
            execution
        };

        let result = self.run_step(&execution, step).await;
        self.release_lease(execution_id, &owner);
        let outcome = result?;

        if let ProcessOutcome::Continued { delay } = outcome {
            self.scheduler.enqueue(execution_id, step + 1, delay).await?;
        }
        Ok(outcome)
    }

    fn unclaimable(execution: &AgentExecution, step: u32) -> Option<ProcessOutcome> {
        if !execution.status.is_runnable() {
            info!(
                execution_id = %execution.id,
                status = %execution.status,
                "Execution not runnable, skipping unit of work"
            );
            return Some(ProcessOutcome::Skipped(execution.status));
        }
        if execution.steps_completed != step {
            info!(
                execution_id = %execution.id,
                step,
                steps_completed = execution.steps_completed,
                "Stale unit of work dropped"
            );
            return Some(ProcessOutcome::Stale {
                steps_completed: execution.steps_completed,
            });
        }
        None
    }

    async fn run_step(&self, execution: &AgentExecution, step: u32) -> WorkerResult<ProcessOutcome> {
        let loaded = {
            let session = self.store.session()?;
            self.load(&session, execution)
        };

        let (interval, result) = match loaded {
            Ok(Loaded::Stopped(status)) => {
                info!(execution_id = %execution.id, status = %status, "Execution stopped before step");
                return Ok(ProcessOutcome::Skipped(status));
            }
            Ok(Loaded::Ready(prepared)) => {
                let interval = prepared.config.iteration_interval;
                (interval, self.pipeline.execute(prepared).await)
            }
            Err(e) => (None, Err(e)),
        };

        let session = self.store.session()?;
        self.persist(&session, execution.id, step, interval, result)
    }

    fn load(&self, session: &StoreSession, execution: &AgentExecution) -> PipelineResult<Loaded> {
        let agent = session
            .get_agent(execution.agent_id)
            .map_err(store_error)?
            .ok_or(PipelineError::AgentNotFound {
                agent_id: execution.agent_id,
                execution_id: execution.id,
            })?;

        if !session.mark_running(execution.id).map_err(store_error)? {
            let status = session
                .get_execution(execution.id)
                .map_err(store_error)?
                .map_or(execution.status, |current| current.status);
            return Ok(Loaded::Stopped(status));
        }
        if execution.status == ExecutionStatus::Pending {
            info!(execution_id = %execution.id, agent_id = %agent.id, "Execution started");
        }

        Ok(Loaded::Ready(self.pipeline.prepare(session, &agent, execution)?))
    }

    fn persist(
        &self,
        session: &StoreSession,
        execution_id: ExecutionId,
        step: u32,
        interval: Option<i64>,
        result: PipelineResult<StepOutcome>,
    ) -> WorkerResult<ProcessOutcome> {
        match result {
            Ok(outcome) => match session.record_step(execution_id, step, outcome)? {
                None => {
                    let steps_completed = session
                        .get_execution(execution_id)?
                        .map_or(step + 1, |current| current.steps_completed);
                    warn!(execution_id = %execution_id, step, "Step already recorded by another delivery, result discarded");
                    Ok(ProcessOutcome::Stale { steps_completed })
                }
                Some(ExecutionStatus::Complete) if outcome == StepOutcome::Complete => {
                    info!(execution_id = %execution_id, "Execution complete");
                    Ok(ProcessOutcome::Completed)
                }
                Some(ExecutionStatus::Running) if outcome == StepOutcome::Continue => Ok(ProcessOutcome::Continued {
                    delay: self.next_delay(interval),
                }),
                Some(status) => {
                    info!(execution_id = %execution_id, status = %status, "Execution stopped during step, not re-enqueuing");
                    Ok(ProcessOutcome::Skipped(status))
                }
            },
            Err(e) => {
                let kind = e.kind();
                let message = e.to_string();
                error!(execution_id = %execution_id, kind = %kind, error = %message, "Execution step failed");
                if !session.mark_failed(execution_id, step, kind.as_str(), &message)? {
                    debug!(execution_id = %execution_id, "Execution terminal or past this step, failure not recorded");
                }
                Ok(ProcessOutcome::Failed(kind))
            }
        }
    }

    fn next_delay(&self, interval: Option<i64>) -> Duration {
        interval
            .and_then(|secs| u64::try_from(secs).ok())
            .filter(|secs| *secs > 0)
            .map_or(self.step_delay, Duration::from_secs)
    }

    /// Release the step lease; an unreleased lease expires after its TTL.
    fn release_lease(&self, execution_id: ExecutionId, owner: &str) {
        let released = self
            .store
            .session()
            .and_then(|session| session.release_lease(execution_id, owner));
        if let Err(e) = released {
            warn!(execution_id = %execution_id, error = %e, "Failed to release step lease");
        }
    }

    /// Pull and process units of work until `shutdown` flips to `true`.
    ///
    /// A slot finishes its in-flight step before it stops.
    pub async fn run_slot(&self, slot: usize, receive_timeout: Duration, shutdown: watch::Receiver<bool>) {
        debug!(slot, "Worker slot started");
        while !*shutdown.borrow() {
            let message = match self.scheduler.broker().receive(receive_timeout).await {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    warn!(slot, error = %e, "Receiving from broker failed");
                    tokio::time::sleep(receive_timeout).await;
                    continue;
                }
            };
            if let Err(e) = self.consume(message).await {
                error!(slot, error = %e, "Unit of work aborted, left for redelivery");
            }
        }
        debug!(slot, "Worker slot stopped");
    }

    /// Run `concurrency` slots until `shutdown` resolves.
    pub async fn run<F>(self: Arc<Self>, concurrency: usize, receive_timeout: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let (stop, stopped) = watch::channel(false);
        let mut slots = JoinSet::new();
        for slot in 0..concurrency.max(1) {
            let worker = Arc::clone(&self);
            let stopped = stopped.clone();
            slots.spawn(async move { worker.run_slot(slot, receive_timeout, stopped).await });
        }
        info!(
            concurrency,
            broker = %self.scheduler.broker().describe(),
            "Worker started"
        );

        shutdown.await;
        info!("Shutdown requested, finishing in-flight steps");
        let _ = stop.send(true);
        while let Some(joined) = slots.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker slot panicked");
            }
        }
        info!("Worker stopped");
    }
}
