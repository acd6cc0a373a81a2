//! Full-stack passes: real tool-using runtime, scripted model replies,
//! mock tools resolved from stored descriptors.

use std::sync::Arc;
use std::time::Duration;
use stepwise::memory::{HashingEmbedder, LtmBackend};
use stepwise::queue::{InMemoryBroker, TaskBroker};
use stepwise::{ExecutionStatus, ProcessOutcome, ToolUsingRuntime, WorkerBuilder, WorkerSettings};
use stepwise_testing::{MockTool, MockToolPlugin, ScriptedChatModel, StaticModelProvider, TestDatabase};

struct Stack {
    db: TestDatabase,
    broker: Arc<InMemoryBroker>,
    worker: stepwise::TaskWorker,
}

async fn stack(model: ScriptedChatModel, lookup: MockTool) -> Stack {
    let db = TestDatabase::new().unwrap();
    let broker = Arc::new(InMemoryBroker::new());

    let mut settings = WorkerSettings::default();
    settings.memory.default_backend = LtmBackend::InMemory;
    settings.tools.resources_dir = db.file("resources");
    settings.step_delay = Duration::from_secs(2);

    let worker = WorkerBuilder::new(settings)
        .with_plugin(&MockToolPlugin::new().with_tool("research::lookup", "LookupTool", lookup))
        .with_store(db.store().clone())
        .with_broker(Arc::clone(&broker) as Arc<dyn TaskBroker>)
        .with_runtime(Arc::new(ToolUsingRuntime::new()))
        .with_model_provider(Arc::new(StaticModelProvider::serving(model)))
        .with_embedder(Arc::new(HashingEmbedder::default()))
        .build()
        .await
        .unwrap();

    Stack { db, broker, worker }
}

#[tokio::test(flavor = "multi_thread")]
async fn agent_uses_a_custom_tool_then_finishes() {
    let model = ScriptedChatModel::new(
        "gpt-4",
        [
            r#"{"thoughts": {"text": "check the docs"}, "command": {"name": "Lookup", "args": {"input": "rust"}}}"#,
            r#"{"command": {"name": "finish", "args": {"reason": "answered"}}}"#,
        ],
    );
    let lookup = MockTool::new("Lookup").with_response("rust", "a systems language");
    let s = stack(model.clone(), lookup.clone()).await;

    let tool_id = s
        .db
        .store()
        .session()
        .unwrap()
        .register_tool("Lookup", "LookupTool", "research", "lookup.py")
        .unwrap()
        .id;
    let tools = format!("[{}]", tool_id);
    let (_, execution) = s
        .db
        .seed_agent("Researcher", &[("goal", r#"["Explain Rust"]"#), ("tools", &tools)])
        .unwrap();

    assert_eq!(
        s.worker.process(execution.id, 0).await.unwrap(),
        ProcessOutcome::Continued {
            delay: Duration::from_secs(2)
        }
    );
    assert_eq!(lookup.call_count(), 1);

    assert_eq!(s.worker.process(execution.id, 1).await.unwrap(), ProcessOutcome::Completed);

    let stored = s.db.store().session().unwrap().get_execution(execution.id).unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Complete);
    assert_eq!(stored.steps_completed, 2);
    assert_eq!(s.broker.history().len(), 1);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    let second_system_prompt = &prompts[1][0].content;
    assert!(second_system_prompt.contains("Command Lookup returned: a systems language"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unparseable_model_reply_fails_the_execution() {
    let model = ScriptedChatModel::new("gpt-4", ["I would rather not answer in JSON."]);
    let s = stack(model, MockTool::new("Lookup")).await;
    let (_, execution) = s.db.seed_agent("Poet", &[("goal", r#"["Write"]"#)]).unwrap();

    assert_eq!(
        s.worker.process(execution.id, 0).await.unwrap(),
        ProcessOutcome::Failed(stepwise::ErrorKind::StepExecution)
    );
    let stored = s.db.store().session().unwrap().get_execution(execution.id).unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert!(s.broker.history().is_empty());
}
