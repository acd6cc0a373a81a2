//! Binds the model and runs one runtime step.

use std::sync::Arc;
use stepwise_core::{MaterializedConfiguration, StepExecutionError, StepOutcome};
use stepwise_memory::LongTermMemory;
use stepwise_runtime::{AgentRuntime, ModelProvider, RuntimeContext};
use stepwise_tools::ToolSet;
use tracing::debug;

/// Builds the runtime context of a step and invokes the runtime once.
///
/// Every failure, including a model that cannot be bound, becomes a
/// [`StepExecutionError`] for the execution.
#[derive(Clone)]
pub struct AgentRuntimeInvoker {
    runtime: Arc<dyn AgentRuntime>,
    models: Arc<dyn ModelProvider>,
}

impl AgentRuntimeInvoker {
    pub fn new(runtime: Arc<dyn AgentRuntime>, models: Arc<dyn ModelProvider>) -> Self {
        Self { runtime, models }
    }

    pub async fn invoke(
        &self,
        config: MaterializedConfiguration,
        tools: ToolSet,
        memory: LongTermMemory,
    ) -> Result<StepOutcome, StepExecutionError> {
        let execution_id = config.agent_execution_id;
        let model = self
            .models
            .bind(config.model.as_deref())
            .map_err(|e| StepExecutionError::new(execution_id, e))?;

        let ctx = RuntimeContext::new(config, model, tools, memory);
        debug!(
            execution_id = %execution_id,
            model = ctx.model.model_name(),
            tools = ctx.tools.len(),
            backend = %ctx.memory.backend(),
            "Invoking agent runtime"
        );
        self.runtime
            .step(&ctx, &ctx.config.goal)
            .await
            .map_err(|e| StepExecutionError::new(execution_id, e))
    }
}
