//! # Stepwise
//!
//! Stepwise runs autonomous agents one bounded step at a time. Each step is
//! a unit of work on a task queue: a worker loads the agent's persisted
//! configuration, resolves its tools, provisions long-term memory, invokes
//! the agent runtime once and either finishes the execution or schedules
//! the next step.
//!
//! ## Crates
//!
//! - **[core]**: domain records, identifiers, configuration materialization
//!   and the pipeline error taxonomy
//! - **[store]**: SQLite persistence of agents, configuration, tool
//!   descriptors and executions
//! - **[queue]**: task brokers (Redis, in-process)
//! - **[tools]**: tool factory registry, built-in tools and assembly
//! - **[memory]**: vector stores and embeddings for long-term memory
//! - **[runtime]**: chat model bindings and the tool-using agent runtime
//! - **[worker]**: settings, scheduler, step pipeline and the task worker
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepwise::{WorkerBuilder, WorkerSettings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = WorkerSettings::from_env()?;
//! let concurrency = settings.concurrency;
//! let receive_timeout = settings.receive_timeout;
//!
//! let worker = Arc::new(WorkerBuilder::new(settings).build().await?);
//! worker
//!     .run(concurrency, receive_timeout, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

pub use stepwise_core as core;
pub use stepwise_memory as memory;
pub use stepwise_queue as queue;
pub use stepwise_runtime as runtime;
pub use stepwise_store as store;
pub use stepwise_tools as tools;
pub use stepwise_worker as worker;

pub use stepwise_core::{
    Agent, AgentExecution, ErrorKind, ExecutionId, ExecutionStatus, MaterializedConfiguration, PipelineError,
    StepOutcome, Tool, UnitOfWork,
};
pub use stepwise_runtime::{AgentRuntime, ChatModel, ToolUsingRuntime};
pub use stepwise_store::SqliteStore;
pub use stepwise_tools::{ToolPlugin, ToolSet};
pub use stepwise_worker::{ExecutionScheduler, ProcessOutcome, TaskWorker, WorkerBuilder, WorkerSettings};
