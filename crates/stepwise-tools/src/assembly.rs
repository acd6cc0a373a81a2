//! Per-step tool set assembly.

use std::sync::Arc;
use stepwise_core::{Tool, ToolDescriptor, ToolResolutionError};
use tracing::debug;

use crate::catalog::{BuiltinTool, BuiltinTools};
use crate::registry::{ToolFactoryRegistry, ToolKey, ToolPlugin, ToolSet};
use crate::settings::ToolSettings;

/// Builds the tool set of a step: the built-in catalog followed by the
/// configured custom tools.
#[derive(Debug, Clone)]
pub struct ToolAssembler {
    registry: Arc<ToolFactoryRegistry>,
    settings: Arc<ToolSettings>,
}

impl ToolAssembler {
    pub fn new(registry: ToolFactoryRegistry, settings: ToolSettings) -> Self {
        Self {
            registry: Arc::new(registry),
            settings: Arc::new(settings),
        }
    }

    /// Assembler with the built-ins plus the given plugins registered.
    pub fn with_plugins(settings: ToolSettings, plugins: &[&dyn ToolPlugin]) -> Self {
        let mut registry = ToolFactoryRegistry::new();
        registry.install(&BuiltinTools);
        for plugin in plugins {
            registry.install(*plugin);
        }
        Self::new(registry, settings)
    }

    pub fn registry(&self) -> &ToolFactoryRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Fresh instances of the built-in catalog, in catalog order.
    pub fn builtins(&self) -> ToolSet {
        BuiltinTool::ALL
            .iter()
            .map(|tool| tool.instantiate(&self.settings))
            .collect()
    }

    /// Instantiate the tool a descriptor names.
    pub fn resolve(&self, descriptor: &ToolDescriptor) -> Result<Arc<dyn Tool>, ToolResolutionError> {
        let key = ToolKey::of(descriptor);
        let factory = self.registry.factory(&key).ok_or_else(|| {
            ToolResolutionError::new(descriptor, format!("no tool factory registered for {}", key))
        })?;
        factory(self.settings.as_ref()).map_err(|reason| ToolResolutionError::new(descriptor, reason))
    }

    /// Built-ins first, then each descriptor in the given order.
    ///
    /// A custom tool whose name is already taken is skipped. The first
    /// descriptor that cannot be resolved fails the whole assembly.
    pub fn assemble(&self, descriptors: &[ToolDescriptor]) -> Result<ToolSet, ToolResolutionError> {
        let mut tools = self.builtins();
        for descriptor in descriptors {
            let tool = self.resolve(descriptor)?;
            let name = tool.name().to_string();
            if !tools.push(tool) {
                debug!(tool = %name, descriptor = %descriptor, "Skipping duplicate tool name");
            }
        }
        Ok(tools)
    }
}
