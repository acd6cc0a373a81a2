//! # Stepwise Worker
//!
//! Turns queued units of work into agent steps.
//!
//! ```text
//! broker ──► TaskWorker ──► StepPipeline ──► AgentRuntimeInvoker ──► AgentRuntime
//!   ▲            │            materialize        bind model
//!   │            │            resolve tools      one step
//!   │            │            provision memory
//!   └── ExecutionScheduler ◄── CONTINUE
//! ```
//!
//! - [`ExecutionScheduler`] enqueues `execute_agent(execution_id, step)` with a delay
//! - [`TaskWorker`] claims a step lease, runs the pipeline, persists the
//!   outcome and re-enqueues non-terminal executions
//! - [`WorkerSettings`] loads `STEPWISE_*` settings; [`WorkerBuilder`] wires
//!   everything from them

#![recursion_limit = "256"]

pub mod builder;
pub mod error;
pub mod invoker;
pub mod pipeline;
pub mod scheduler;
pub mod settings;
pub mod worker;

pub use builder::{WorkerBuilder, open_scheduler, open_store};
pub use error::{WorkerError, WorkerResult};
pub use invoker::AgentRuntimeInvoker;
pub use pipeline::{PreparedStep, StepPipeline};
pub use scheduler::ExecutionScheduler;
pub use settings::{SettingsError, SettingsResult, WorkerSettings, parse_duration};
pub use worker::{ProcessOutcome, TaskWorker};
