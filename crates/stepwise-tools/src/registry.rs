//! Factory registry resolving `(module, class)` pairs to tool instances.
//!
//! Tool descriptors persisted in the store name a module path and a class.
//! Instead of loading code by name, every resolvable pair is registered
//! up front with a factory closure: built-ins at process start, custom tools
//! through [`ToolPlugin`]s.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stepwise_core::{Tool, ToolDescriptor, ToolSpec};
use tracing::{debug, warn};

use crate::settings::ToolSettings;

/// Registry key: module path (`folder::file_stem`) and class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolKey {
    pub module: String,
    pub class: String,
}

impl ToolKey {
    pub fn new(module: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            class: class.into(),
        }
    }

    pub fn of(descriptor: &ToolDescriptor) -> Self {
        Self::new(descriptor.module_path(), descriptor.class_name.clone())
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.class)
    }
}

/// Builds a tool instance; an `Err` is the reason instantiation failed.
pub type ToolFactory = Arc<dyn Fn(&ToolSettings) -> Result<Arc<dyn Tool>, String> + Send + Sync>;

/// A bundle of tool factories registered together.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use serde_json::Value;
/// use stepwise_core::{ExecutionResult, Tool};
/// use stepwise_tools::{ToolFactoryRegistry, ToolKey, ToolPlugin};
///
/// struct Weather;
///
/// impl Tool for Weather {
///     fn name(&self) -> &str { "Weather" }
///     fn execute(&self, _args: Value) -> ExecutionResult { ExecutionResult::success("sunny") }
/// }
///
/// struct WeatherPlugin;
///
/// impl ToolPlugin for WeatherPlugin {
///     fn name(&self) -> &str { "weather" }
///     fn register(&self, registry: &mut ToolFactoryRegistry) {
///         registry.register("weather::forecast", "WeatherTool", |_settings| Ok(Arc::new(Weather) as Arc<dyn Tool>));
///     }
/// }
///
/// let mut registry = ToolFactoryRegistry::new();
/// registry.install(&WeatherPlugin);
/// assert!(registry.contains(&ToolKey::new("weather::forecast", "WeatherTool")));
/// ```
pub trait ToolPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn register(&self, registry: &mut ToolFactoryRegistry);
}

#[derive(Clone, Default)]
pub struct ToolFactoryRegistry {
    factories: HashMap<ToolKey, ToolFactory>,
}

impl fmt::Debug for ToolFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolFactoryRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl ToolFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any earlier one for the same key.
    pub fn register<F>(&mut self, module: impl Into<String>, class: impl Into<String>, factory: F)
    where
        F: Fn(&ToolSettings) -> Result<Arc<dyn Tool>, String> + Send + Sync + 'static,
    {
        let key = ToolKey::new(module, class);
        let factory: ToolFactory = Arc::new(factory);
        if self.factories.insert(key.clone(), factory).is_some() {
            warn!(tool = %key, "Tool factory replaced");
        }
    }

    /// Let a plugin register its factories.
    pub fn install(&mut self, plugin: &dyn ToolPlugin) {
        let before = self.factories.len();
        plugin.register(self);
        debug!(
            plugin = plugin.name(),
            added = self.factories.len().saturating_sub(before),
            "Tool plugin installed"
        );
    }

    pub fn factory(&self, key: &ToolKey) -> Option<&ToolFactory> {
        self.factories.get(key)
    }

    pub fn contains(&self, key: &ToolKey) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<ToolKey> {
        let mut keys: Vec<ToolKey> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// The ordered, name-unique set of tools handed to the runtime for a step.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `tool` unless a tool with the same name is present.
    pub fn push(&mut self, tool: Arc<dyn Tool>) -> bool {
        if self.get(tool.name()).is_some() {
            return false;
        }
        self.tools.push(tool);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| ToolSpec::of(tool.as_ref())).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        let mut set = ToolSet::new();
        for tool in iter {
            set.push(tool);
        }
        set
    }
}
