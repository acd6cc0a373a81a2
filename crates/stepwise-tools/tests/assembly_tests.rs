//! Tool set assembly as a worker step sees it: built-ins, plugins and
//! descriptors loaded from the store.

use serde_json::{Value, json};
use std::sync::Arc;
use stepwise_core::{ExecutionResult, ToolDescriptor, ToolId};
use stepwise_tools::{BuiltinTool, Tool, ToolAssembler, ToolFactoryRegistry, ToolPlugin, ToolSettings};
use tempfile::TempDir;

struct Counter {
    prefix: String,
}

impl Tool for Counter {
    fn name(&self) -> &str {
        "Count Words"
    }

    fn description(&self) -> &str {
        "Counts the words of `text`"
    }

    fn args_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
    }

    fn execute(&self, args: Value) -> ExecutionResult {
        match args.get("text").and_then(Value::as_str) {
            Some(text) => ExecutionResult::success(format!("{}{}", self.prefix, text.split_whitespace().count())),
            None => ExecutionResult::invalid_input("missing 'text'"),
        }
    }
}

struct TextPlugin;

impl ToolPlugin for TextPlugin {
    fn name(&self) -> &str {
        "text"
    }

    fn register(&self, registry: &mut ToolFactoryRegistry) {
        registry.register("text::count_words", "CountWordsTool", |settings| {
            Ok(Arc::new(Counter {
                prefix: format!("[{}] ", settings.resources_dir.display()),
            }) as Arc<dyn Tool>)
        });
    }
}

fn count_words_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        id: ToolId::new(12),
        name: "Count Words".into(),
        class_name: "CountWordsTool".into(),
        folder_name: "text".into(),
        file_name: "count_words.py".into(),
    }
}

#[test]
fn custom_tools_receive_worker_settings() {
    let settings = ToolSettings::default().with_resources_dir("/srv/resources");
    let assembler = ToolAssembler::with_plugins(settings, &[&TextPlugin]);
    let tools = assembler.assemble(&[count_words_descriptor()]).unwrap();

    let counter = tools.get("Count Words").unwrap();
    assert_eq!(
        counter.execute(json!({"text": "one two three"})).output(),
        "[/srv/resources] 3"
    );
}

#[test]
fn tool_specs_follow_assembly_order() {
    let assembler = ToolAssembler::with_plugins(ToolSettings::default(), &[&TextPlugin]);
    let specs = assembler.assemble(&[count_words_descriptor()]).unwrap().specs();
    assert_eq!(specs.len(), BuiltinTool::ALL.len() + 1);
    assert_eq!(specs.last().unwrap().description, "Counts the words of `text`");
    assert!(specs.iter().all(|spec| spec.args_schema.is_object()));
}

#[test]
fn built_in_file_tools_share_the_resources_dir() {
    let dir = TempDir::new().unwrap();
    let assembler = ToolAssembler::with_plugins(ToolSettings::default().with_resources_dir(dir.path()), &[]);
    let tools = assembler.assemble(&[]).unwrap();

    let written = tools
        .get("Write File")
        .unwrap()
        .execute(json!({"file_name": "plan.md", "content": "1. research"}));
    assert!(written.is_success());
    let read = tools.get("Read File").unwrap().execute(json!({"file_name": "plan.md"}));
    assert_eq!(read.output(), "1. research");
}
