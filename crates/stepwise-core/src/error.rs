//! Error taxonomy of the execution pipeline.
//!
//! Each pipeline stage fails with its own error type. [`PipelineError`] unifies
//! them for the worker, which persists the [`ErrorKind`] and display message
//! on the failed execution.

use std::fmt;
use thiserror::Error;

use crate::identifiers::{AgentId, ExecutionId};

/// Boxed error used as the cause of a runtime step failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// A configuration value could not be parsed for its key.
///
/// Materialization fails as a whole on the first malformed value; no default
/// is ever substituted for a corrupted entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse configuration key '{key}' from {raw_value:?}: {reason}")]
pub struct ConfigParseError {
    pub key: String,
    pub raw_value: String,
    pub reason: String,
}

impl ConfigParseError {
    pub fn new(key: impl Into<String>, raw_value: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            key: key.into(),
            raw_value: raw_value.into(),
            reason: reason.to_string(),
        }
    }
}

/// A tool descriptor could not be located or instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve {descriptor}: {reason}")]
pub struct ToolResolutionError {
    /// Human-readable descriptor, e.g. `tool #4 (github::search_repo::GithubRepoSearchTool)`.
    pub descriptor: String,
    pub reason: String,
}

impl ToolResolutionError {
    pub fn new(descriptor: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }
}

/// The agent runtime failed while executing a step.
#[derive(Debug, Error)]
#[error("step of execution {execution_id} failed: {cause}")]
pub struct StepExecutionError {
    pub execution_id: ExecutionId,
    #[source]
    pub cause: BoxError,
}

impl StepExecutionError {
    pub fn new(execution_id: ExecutionId, cause: impl Into<BoxError>) -> Self {
        Self {
            execution_id,
            cause: cause.into(),
        }
    }
}

/// Machine-readable category persisted alongside a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigParse,
    ToolResolution,
    StepExecution,
    AgentNotFound,
    Store,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigParse => "config_parse",
            ErrorKind::ToolResolution => "tool_resolution",
            ErrorKind::StepExecution => "step_execution",
            ErrorKind::AgentNotFound => "agent_not_found",
            ErrorKind::Store => "store",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any failure of one pipeline pass over a unit of work.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigParseError),

    #[error(transparent)]
    ToolResolution(#[from] ToolResolutionError),

    #[error(transparent)]
    Step(#[from] StepExecutionError),

    #[error("agent {agent_id} referenced by execution {execution_id} not found")]
    AgentNotFound {
        agent_id: AgentId,
        execution_id: ExecutionId,
    },

    #[error("store error: {0}")]
    Store(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::ConfigParse,
            PipelineError::ToolResolution(_) => ErrorKind::ToolResolution,
            PipelineError::Step(_) => ErrorKind::StepExecution,
            PipelineError::AgentNotFound { .. } => ErrorKind::AgentNotFound,
            PipelineError::Store(_) => ErrorKind::Store,
        }
    }
}
