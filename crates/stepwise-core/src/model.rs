//! Persisted domain model.
//!
//! These records mirror the rows held by the relational store. They carry no
//! behaviour beyond status bookkeeping; the pipeline stages own the logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::identifiers::{AgentId, ExecutionId, ProjectId, ToolId};

/// A persisted agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub description: Option<String>,
    pub project_id: Option<ProjectId>,
    /// Reference to the workflow definition the agent follows.
    pub agent_workflow_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of an [`AgentExecution`].
///
/// `PENDING -> RUNNING -> COMPLETE | FAILED`, with `CANCELLED` set from
/// outside the pipeline at any point before a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Complete => "COMPLETE",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Cancelled => "CANCELLED",
        }
    }

    /// No further step may run once an execution reaches one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Complete | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Whether a unit of work for an execution in this status should run a step.
    pub fn is_runnable(&self) -> bool {
        matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string that is not part of the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown execution status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ExecutionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "CREATED" => Ok(ExecutionStatus::Pending),
            "RUNNING" => Ok(ExecutionStatus::Running),
            "COMPLETE" | "COMPLETED" => Ok(ExecutionStatus::Complete),
            "FAILED" => Ok(ExecutionStatus::Failed),
            "CANCELLED" | "CANCELED" => Ok(ExecutionStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// One run instance of an [`Agent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentExecution {
    pub id: ExecutionId,
    pub agent_id: AgentId,
    pub name: String,
    pub status: ExecutionStatus,
    pub steps_completed: u32,
    /// Display message of the error that failed the execution.
    pub last_error: Option<String>,
    /// Machine-readable kind of that error (see `ErrorKind`).
    pub error_kind: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A raw key/value configuration row scoped to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfigurationEntry {
    pub agent_id: AgentId,
    pub key: String,
    pub value: String,
    /// Encoding version of `value`; see `config::upgrade`.
    pub schema_version: u32,
}

impl AgentConfigurationEntry {
    pub fn new(agent_id: AgentId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            agent_id,
            key: key.into(),
            value: value.into(),
            schema_version: crate::config::CONFIG_SCHEMA_VERSION,
        }
    }
}

/// Where a tool implementation lives: resolved through the factory registry
/// by its `(module, class)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: ToolId,
    pub name: String,
    pub class_name: String,
    pub folder_name: String,
    pub file_name: String,
}

impl ToolDescriptor {
    /// Module path used as the first half of the factory key.
    ///
    /// The file extension is dropped so `github/search_repo.rs` and
    /// `github/search_repo` name the same module.
    pub fn module_path(&self) -> String {
        let stem = self
            .file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.file_name);
        format!("{}::{}", self.folder_name, stem)
    }
}

impl fmt::Display for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tool #{} ({}::{})",
            self.id,
            self.module_path(),
            self.class_name
        )
    }
}

/// One schedulable step of an execution as placed on the queue.
///
/// `step` is the number of steps the execution had completed when the unit
/// was scheduled. A unit whose step no longer matches the execution's
/// counter is stale and runs nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitOfWork {
    pub execution_id: ExecutionId,
    pub step: u32,
    pub delay: Duration,
}

impl UnitOfWork {
    pub fn immediate(execution_id: ExecutionId, step: u32) -> Self {
        Self {
            execution_id,
            step,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(execution_id: ExecutionId, step: u32, delay: Duration) -> Self {
        Self {
            execution_id,
            step,
            delay,
        }
    }
}

/// Signal returned by one runtime step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutcome {
    /// More steps are needed; the execution is re-enqueued.
    Continue,
    /// The agent reached its goal; no further steps.
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(file: &str) -> ToolDescriptor {
        ToolDescriptor {
            id: ToolId::new(3),
            name: "GithubRepo Search".into(),
            class_name: "GithubRepoSearchTool".into(),
            folder_name: "github".into(),
            file_name: file.into(),
        }
    }

    #[test]
    fn module_path_drops_extension() {
        assert_eq!(descriptor("search_repo.rs").module_path(), "github::search_repo");
        assert_eq!(descriptor("search_repo.py").module_path(), "github::search_repo");
        assert_eq!(descriptor("search_repo").module_path(), "github::search_repo");
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Complete,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ExecutionStatus>().unwrap(), status);
        }
        assert!("PAUSED".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn terminal_and_runnable_partition() {
        assert!(ExecutionStatus::Pending.is_runnable());
        assert!(ExecutionStatus::Running.is_runnable());
        assert!(ExecutionStatus::Complete.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Cancelled.is_runnable());
    }
}
