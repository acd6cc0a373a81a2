//! Task messages as they travel through the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use stepwise_core::ExecutionId;

use crate::error::{QueueError, QueueResult};

/// Name of the task that runs one step of an agent execution.
pub const EXECUTE_AGENT_TASK: &str = "execute_agent";

/// A named task with positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Unique per submission; a redelivered message keeps its id.
    pub id: Uuid,
    pub task: String,
    pub args: Vec<Value>,
    pub submitted_at: DateTime<Utc>,
}

impl TaskMessage {
    pub fn new(task: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
            args,
            submitted_at: Utc::now(),
        }
    }

    /// `execute_agent(execution_id, step)`
    pub fn execute_agent(execution_id: ExecutionId, step: u32) -> Self {
        Self::new(
            EXECUTE_AGENT_TASK,
            vec![Value::from(execution_id.get()), Value::from(step)],
        )
    }

    /// The execution id argument of an `execute_agent` task.
    pub fn execution_id(&self) -> QueueResult<ExecutionId> {
        self.unit().map(|(id, _)| id)
    }

    /// Execution id and expected step of an `execute_agent` task.
    pub fn unit(&self) -> QueueResult<(ExecutionId, u32)> {
        if self.task != EXECUTE_AGENT_TASK {
            return Err(QueueError::DeserializationFailed(format!(
                "task {} is '{}', not '{}'",
                self.id, self.task, EXECUTE_AGENT_TASK
            )));
        }
        let [Value::Number(id), Value::Number(step)] = self.args.as_slice() else {
            return Err(QueueError::DeserializationFailed(format!(
                "task {}: expected execution id and step, got {:?}",
                self.id, self.args
            )));
        };
        let id = id.as_i64().map(ExecutionId::new).ok_or_else(|| {
            QueueError::DeserializationFailed(format!("task {}: execution id {} out of range", self.id, id))
        })?;
        let step = step
            .as_u64()
            .and_then(|step| u32::try_from(step).ok())
            .ok_or_else(|| QueueError::DeserializationFailed(format!("task {}: step {} out of range", self.id, step)))?;
        Ok((id, step))
    }

    pub fn to_json(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> QueueResult<Self> {
        serde_json::from_str(json).map_err(|e| QueueError::DeserializationFailed(e.to_string()))
    }
}
