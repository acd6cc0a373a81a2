//! Everything the runtime sees during one step.

use std::fmt;
use std::sync::Arc;
use stepwise_core::{ExecutionId, MaterializedConfiguration};
use stepwise_memory::{LongTermMemory, agent_namespace};
use stepwise_tools::ToolSet;

use crate::model::ChatModel;

/// Runtime context of one step, rebuilt for every unit of work.
#[derive(Clone)]
pub struct RuntimeContext {
    /// Agent name as shown to the model.
    pub name: String,
    /// Role the agent plays; its description.
    pub role: String,
    pub model: Arc<dyn ChatModel>,
    pub tools: ToolSet,
    pub memory: LongTermMemory,
    pub config: MaterializedConfiguration,
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("name", &self.name)
            .field("model", &self.model.model_name())
            .field("tools", &self.tools)
            .field("memory", &self.memory)
            .finish()
    }
}

impl RuntimeContext {
    /// Context for `config`; name and role come from the configuration.
    pub fn new(
        config: MaterializedConfiguration,
        model: Arc<dyn ChatModel>,
        tools: ToolSet,
        memory: LongTermMemory,
    ) -> Self {
        Self {
            name: config.name.clone(),
            role: config.description.clone().unwrap_or_default(),
            model,
            tools,
            memory,
            config,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.config.agent_execution_id
    }

    /// Long-term memory namespace of the agent.
    pub fn memory_namespace(&self) -> String {
        agent_namespace(self.config.agent_id)
    }

    /// How many memories to recall; `memory_window` when set and positive.
    pub fn memory_window(&self, default: usize) -> usize {
        self.config
            .memory_window
            .and_then(|window| usize::try_from(window).ok())
            .filter(|window| *window > 0)
            .unwrap_or(default)
    }
}
