//! Tool capability contract.
//!
//! A tool is a named capability the agent runtime may choose to call during a
//! step. It declares a description and an argument schema for the runtime's
//! tool-selection prompt and executes synchronously: tool calls occupy the
//! worker slot that runs them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categorized failure reasons for tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// Arguments missing or of the wrong shape
    InvalidInput { message: String },
    /// Required resource not found (file, issue, repository, ...)
    NotFound { resource: String },
    /// Credentials missing or rejected
    PermissionDenied { message: String },
    /// Remote service unreachable or returned an error status
    NetworkError { message: String },
    /// Local I/O failed
    IoError { message: String },
    /// Anything else
    InternalError { message: String },
}

impl FailureReason {
    /// Get a human-readable error message
    pub fn message(&self) -> String {
        match self {
            FailureReason::InvalidInput { message } => format!("Invalid input: {}", message),
            FailureReason::NotFound { resource } => format!("Not found: {}", resource),
            FailureReason::PermissionDenied { message } => {
                format!("Permission denied: {}", message)
            }
            FailureReason::NetworkError { message } => format!("Network error: {}", message),
            FailureReason::IoError { message } => format!("I/O error: {}", message),
            FailureReason::InternalError { message } => format!("Internal error: {}", message),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// The result of executing a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Tool executed successfully with the given output.
    Success { output: String },

    /// Tool execution failed with a structured reason.
    Failure { reason: FailureReason },
}

impl ExecutionResult {
    /// Create a successful execution result.
    pub fn success(output: impl Into<String>) -> Self {
        ExecutionResult::Success {
            output: output.into(),
        }
    }

    /// Create a failed execution result with a structured reason.
    pub fn failed(reason: FailureReason) -> Self {
        ExecutionResult::Failure { reason }
    }

    /// Shorthand for an `InvalidInput` failure.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::failed(FailureReason::InvalidInput {
            message: message.into(),
        })
    }

    /// Shorthand for an `InternalError` failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::failed(FailureReason::InternalError {
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    /// The string handed back to the runtime: the output on success, the
    /// failure message otherwise. The runtime observes both the same way.
    pub fn output(&self) -> String {
        match self {
            ExecutionResult::Success { output } => output.clone(),
            ExecutionResult::Failure { reason } => reason.message(),
        }
    }

    /// Convert to a `Result` for callers that branch on success.
    pub fn into_result(self) -> Result<String, FailureReason> {
        match self {
            ExecutionResult::Success { output } => Ok(output),
            ExecutionResult::Failure { reason } => Err(reason),
        }
    }
}

/// A capability the agent runtime can invoke.
///
/// # Example
///
/// ```rust
/// use serde_json::{Value, json};
/// use stepwise_core::{ExecutionResult, Tool};
///
/// struct Echo;
///
/// impl Tool for Echo {
///     fn name(&self) -> &str { "Echo" }
///     fn description(&self) -> &str { "Repeats its `text` argument" }
///     fn args_schema(&self) -> Value {
///         json!({"type": "object", "properties": {"text": {"type": "string"}}})
///     }
///     fn execute(&self, args: Value) -> ExecutionResult {
///         match args.get("text").and_then(Value::as_str) {
///             Some(text) => ExecutionResult::success(text),
///             None => ExecutionResult::invalid_input("missing 'text'"),
///         }
///     }
/// }
///
/// assert_eq!(Echo.execute(json!({"text": "hi"})).output(), "hi");
/// ```
pub trait Tool: Send + Sync {
    /// Unique name the runtime uses to select this tool.
    fn name(&self) -> &str;

    /// Human-readable description shown to the runtime.
    fn description(&self) -> &str {
        ""
    }

    /// JSON Schema of the structured arguments accepted by [`Tool::execute`].
    fn args_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Execute the tool with structured arguments.
    ///
    /// Failures are reported in the returned value, never by panicking; the
    /// runtime feeds them back to the model like any other observation.
    fn execute(&self, args: Value) -> ExecutionResult;
}

/// Name, description and schema of a tool, as rendered for the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub args_schema: Value,
}

impl ToolSpec {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            args_schema: tool.args_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_output_is_reason_message() {
        let result = ExecutionResult::failed(FailureReason::NotFound {
            resource: "notes.txt".into(),
        });
        assert!(!result.is_success());
        assert_eq!(result.output(), "Not found: notes.txt");
    }

    #[test]
    fn into_result_splits_variants() {
        assert_eq!(ExecutionResult::success("ok").into_result(), Ok("ok".to_string()));
        assert!(ExecutionResult::invalid_input("bad").into_result().is_err());
    }
}
