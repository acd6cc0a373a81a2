//! The agent runtime contract and the default tool-using runtime.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use stepwise_core::StepOutcome;
use tracing::{debug, info, warn};

use crate::context::RuntimeContext;
use crate::error::{RuntimeError, RuntimeResult};
use crate::prompt::{self, AgentCommand};

/// Runs one bounded step of an agent.
///
/// The runtime may call tools and read or write long-term memory through
/// the context; the caller only sees the outcome.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn step(&self, ctx: &RuntimeContext, goals: &[String]) -> RuntimeResult<StepOutcome>;
}

/// Asks the bound model for one command per step and runs it.
///
/// A step recalls the memories closest to the goals, prompts the model,
/// executes the chosen tool on the blocking pool and stores the observation
/// in long-term memory. The `finish` command completes the execution.
/// Memory failures are logged and never fail the step.
#[derive(Debug, Clone)]
pub struct ToolUsingRuntime {
    recall_limit: usize,
}

impl Default for ToolUsingRuntime {
    fn default() -> Self {
        Self {
            recall_limit: Self::DEFAULT_RECALL_LIMIT,
        }
    }
}

impl ToolUsingRuntime {
    pub const DEFAULT_RECALL_LIMIT: usize = 5;

    pub fn new() -> Self {
        Self::default()
    }

    /// Memories recalled when the agent sets no `memory_window`.
    pub fn with_recall_limit(mut self, limit: usize) -> Self {
        self.recall_limit = limit;
        self
    }

    async fn run_command(&self, ctx: &RuntimeContext, command: &AgentCommand) -> RuntimeResult<String> {
        let Some(tool) = ctx.tools.get(&command.name) else {
            warn!(execution_id = %ctx.execution_id(), tool = %command.name, "Model chose an unknown command");
            return Ok(format!(
                "Unknown command '{}'. Available commands: {}, {}",
                command.name,
                ctx.tools.names().join(", "),
                prompt::FINISH_COMMAND
            ));
        };

        let tool = Arc::clone(tool);
        let args = command.args.clone();
        let result = tokio::task::spawn_blocking(move || tool.execute(args))
            .await
            .map_err(|e| RuntimeError::ToolAborted {
                tool: command.name.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            execution_id = %ctx.execution_id(),
            tool = %command.name,
            success = result.is_success(),
            "Tool executed"
        );
        Ok(format!("Command {} returned: {}", command.name, result.output()))
    }

    async fn remember(&self, ctx: &RuntimeContext, text: &str, tool: &str) {
        let metadata = json!({
            "execution_id": ctx.execution_id().get(),
            "tool": tool,
        });
        if let Err(e) = ctx.memory.remember(&ctx.memory_namespace(), text, metadata).await {
            warn!(execution_id = %ctx.execution_id(), error = %e, "Failed to store step in long-term memory");
        }
    }
}

#[async_trait]
impl AgentRuntime for ToolUsingRuntime {
    async fn step(&self, ctx: &RuntimeContext, goals: &[String]) -> RuntimeResult<StepOutcome> {
        let namespace = ctx.memory_namespace();
        let limit = ctx.memory_window(self.recall_limit);
        let memories = match ctx.memory.recall(&namespace, &goals.join("\n"), limit).await {
            Ok(memories) => memories,
            Err(e) => {
                warn!(execution_id = %ctx.execution_id(), error = %e, "Long-term memory recall failed");
                Vec::new()
            }
        };

        let messages = prompt::build_messages(ctx, goals, &memories);
        let reply = ctx.model.complete(&messages).await?;
        let command = prompt::parse_command(&reply)?;

        if command.is_finish() {
            let reason = command
                .args
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("objectives complete");
            info!(execution_id = %ctx.execution_id(), reason, "Agent finished");
            self.remember(ctx, &format!("Finished: {}", reason), prompt::FINISH_COMMAND)
                .await;
            return Ok(StepOutcome::Complete);
        }

        let observation = self.run_command(ctx, &command).await?;
        let record = match &command.thought {
            Some(thought) => format!("Thought: {}\n{}", thought, observation),
            None => observation,
        };
        self.remember(ctx, &record, &command.name).await;
        Ok(StepOutcome::Continue)
    }
}
