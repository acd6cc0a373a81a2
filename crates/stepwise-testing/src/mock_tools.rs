//! # Mock Tools for Testing
//!
//! Tools with predictable responses that record every call, and a plugin
//! registering them under descriptor keys.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use stepwise_core::{ExecutionResult, Tool};
use stepwise_tools::{ToolFactoryRegistry, ToolPlugin};

/// A tool that answers from a table keyed by its `input` argument.
#[derive(Debug, Clone)]
pub struct MockTool {
    name: String,
    description: String,
    responses: HashMap<String, ExecutionResult>,
    default_response: Option<ExecutionResult>,
    call_history: Arc<Mutex<Vec<Value>>>,
}

impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("Mock tool {}", name),
            name,
            responses: HashMap::new(),
            default_response: None,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Respond with `response` when called with `{"input": input}`.
    pub fn with_response(mut self, input: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses
            .insert(input.into(), ExecutionResult::success(response.into()));
        self
    }

    pub fn with_failure(mut self, input: impl Into<String>, error: impl Into<String>) -> Self {
        self.responses
            .insert(input.into(), ExecutionResult::failure(error.into()));
        self
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = Some(ExecutionResult::success(response.into()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_history.lock().map(|calls| calls.len()).unwrap_or_default()
    }

    /// Arguments of every call, in call order.
    pub fn call_history(&self) -> Vec<Value> {
        self.call_history.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn args_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"input": {"type": "string"}},
            "required": ["input"]
        })
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        if let Ok(mut calls) = self.call_history.lock() {
            calls.push(args.clone());
        }
        let input = args.get("input").and_then(Value::as_str).unwrap_or_default();
        self.responses
            .get(input)
            .or(self.default_response.as_ref())
            .cloned()
            .unwrap_or_else(|| ExecutionResult::success(format!("Mock response for: {}", input)))
    }
}

/// Registers mock tools under `(module, class)` keys.
///
/// Every factory hands out a clone of the same [`MockTool`], so call
/// history is shared between the test and the worker.
#[derive(Debug, Clone, Default)]
pub struct MockToolPlugin {
    tools: Vec<(String, String, MockTool)>,
}

impl MockToolPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, module: impl Into<String>, class: impl Into<String>, tool: MockTool) -> Self {
        self.tools.push((module.into(), class.into(), tool));
        self
    }
}

impl ToolPlugin for MockToolPlugin {
    fn name(&self) -> &str {
        "mock"
    }

    fn register(&self, registry: &mut ToolFactoryRegistry) {
        for (module, class, tool) in &self.tools {
            let tool = tool.clone();
            registry.register(module.as_str(), class.as_str(), move |_| Ok(Arc::new(tool.clone()) as Arc<dyn Tool>));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepwise_tools::ToolKey;

    #[test]
    fn responds_from_table_and_records_calls() {
        let tool = MockTool::new("Lookup")
            .with_response("rust", "a language")
            .with_failure("bad", "boom");

        assert_eq!(tool.execute(json!({"input": "rust"})).output(), "a language");
        assert!(!tool.execute(json!({"input": "bad"})).is_success());
        assert_eq!(tool.execute(json!({"input": "other"})).output(), "Mock response for: other");
        assert_eq!(tool.call_count(), 3);
        assert_eq!(tool.call_history()[0], json!({"input": "rust"}));
    }

    #[test]
    fn plugin_shares_history_with_the_test() {
        let tool = MockTool::new("Lookup");
        let mut registry = ToolFactoryRegistry::new();
        registry.install(&MockToolPlugin::new().with_tool("mock::lookup", "LookupTool", tool.clone()));

        let factory = registry.factory(&ToolKey::new("mock::lookup", "LookupTool")).unwrap();
        let built = factory(&Default::default()).unwrap();
        built.execute(json!({"input": "x"}));
        assert_eq!(tool.call_count(), 1);
    }
}
