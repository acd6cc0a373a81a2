//! The per-step pipeline: materialize, resolve tools, provision memory,
//! invoke the runtime.

use std::sync::Arc;
use stepwise_core::{
    Agent, AgentExecution, ConfigurationMaterializer, MaterializedConfiguration, PipelineError,
    PipelineResult, StepOutcome, ToolDescriptor, ToolResolutionError,
};
use stepwise_memory::MemoryProvisioner;
use stepwise_store::{StoreError, StoreSession};
use stepwise_tools::ToolAssembler;

use crate::invoker::AgentRuntimeInvoker;

/// Everything a step needs from the store, loaded up front so no session
/// is held while the runtime works.
#[derive(Debug, Clone)]
pub struct PreparedStep {
    pub config: MaterializedConfiguration,
    /// Descriptors of the configured custom tools, in configuration order.
    pub descriptors: Vec<ToolDescriptor>,
}

pub(crate) fn store_error(err: StoreError) -> PipelineError {
    PipelineError::Store(err.to_string())
}

pub struct StepPipeline {
    materializer: ConfigurationMaterializer,
    assembler: ToolAssembler,
    provisioner: Arc<MemoryProvisioner>,
    invoker: AgentRuntimeInvoker,
}

impl StepPipeline {
    pub fn new(assembler: ToolAssembler, provisioner: Arc<MemoryProvisioner>, invoker: AgentRuntimeInvoker) -> Self {
        Self {
            materializer: ConfigurationMaterializer::new(),
            assembler,
            provisioner,
            invoker,
        }
    }

    pub fn assembler(&self) -> &ToolAssembler {
        &self.assembler
    }

    /// Materialize the configuration and load the configured tool rows.
    ///
    /// A configured tool id without a descriptor row is a resolution error.
    pub fn prepare(
        &self,
        session: &StoreSession,
        agent: &Agent,
        execution: &AgentExecution,
    ) -> PipelineResult<PreparedStep> {
        let entries = session.configuration_entries(agent.id).map_err(store_error)?;
        let config = self.materializer.materialize(agent, execution.id, &entries)?;

        let mut descriptors = Vec::with_capacity(config.tools.len());
        for id in &config.tools {
            let descriptor = session.tool_descriptor(*id).map_err(store_error)?.ok_or_else(|| {
                ToolResolutionError::new(format!("tool #{}", id), "no tool descriptor with this id")
            })?;
            descriptors.push(descriptor);
        }

        Ok(PreparedStep { config, descriptors })
    }

    /// Assemble tools, provision memory and run one runtime step.
    pub async fn execute(&self, step: PreparedStep) -> PipelineResult<StepOutcome> {
        let tools = self.assembler.assemble(&step.descriptors)?;
        let memory = self.provisioner.provision(step.config.ltm_db.as_deref()).await;
        Ok(self.invoker.invoke(step.config, tools, memory).await?)
    }
}
