//! Integration tests for the SQLite store: status transitions, step leases,
//! configuration rows and session release.

use std::time::Duration;

use stepwise_core::{AgentId, ExecutionId, ExecutionStatus, ProjectId, StepOutcome, ToolId};
use stepwise_store::{SqliteStore, StoreError};
use tempfile::TempDir;

fn open_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("stepwise.db"), 2).unwrap();
    (dir, store)
}

#[test]
fn execution_lifecycle_runs_to_completion() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();

    let agent = session
        .create_agent("researcher", Some("finds things"), Some(ProjectId::new(3)))
        .unwrap();
    let execution = session.create_execution(agent.id, "run 1").unwrap();
    assert_eq!(execution.status, ExecutionStatus::Pending);
    assert_eq!(execution.steps_completed, 0);

    assert!(session.mark_running(execution.id).unwrap());
    assert_eq!(
        session.record_step(execution.id, 0, StepOutcome::Continue).unwrap(),
        Some(ExecutionStatus::Running)
    );
    assert_eq!(
        session.record_step(execution.id, 1, StepOutcome::Complete).unwrap(),
        Some(ExecutionStatus::Complete)
    );

    let done = session.get_execution(execution.id).unwrap().unwrap();
    assert_eq!(done.steps_completed, 2);
    assert!(!session.mark_running(execution.id).unwrap());
}

#[test]
fn failure_is_persisted_with_kind_and_not_overwritten() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();
    let agent = session.create_agent("a", None, None).unwrap();
    let execution = session.create_execution(agent.id, "run").unwrap();

    assert!(session.mark_failed(execution.id, 0, "config_parse", "bad goal").unwrap());
    let failed = session.get_execution(execution.id).unwrap().unwrap();
    assert_eq!(failed.status, ExecutionStatus::Failed);
    assert_eq!(failed.error_kind.as_deref(), Some("config_parse"));
    assert_eq!(failed.last_error.as_deref(), Some("bad goal"));

    assert!(!session.mark_failed(execution.id, 0, "store", "later").unwrap());
    assert!(!session.cancel_execution(execution.id).unwrap());
}

#[test]
fn cancelled_execution_is_not_completed_by_a_late_step() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();
    let agent = session.create_agent("a", None, None).unwrap();
    let execution = session.create_execution(agent.id, "run").unwrap();

    session.mark_running(execution.id).unwrap();
    assert!(session.cancel_execution(execution.id).unwrap());
    assert_eq!(
        session.record_step(execution.id, 0, StepOutcome::Complete).unwrap(),
        Some(ExecutionStatus::Cancelled)
    );

    let cancelled = session.get_execution(execution.id).unwrap().unwrap();
    assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
    assert_eq!(cancelled.steps_completed, 0);
}

#[test]
fn a_step_is_recorded_once() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();
    let agent = session.create_agent("a", None, None).unwrap();
    let execution = session.create_execution(agent.id, "run").unwrap();
    session.mark_running(execution.id).unwrap();

    assert_eq!(
        session.record_step(execution.id, 0, StepOutcome::Continue).unwrap(),
        Some(ExecutionStatus::Running)
    );
    assert_eq!(session.record_step(execution.id, 0, StepOutcome::Continue).unwrap(), None);
    assert!(!session.mark_failed(execution.id, 0, "step_execution", "late duplicate").unwrap());

    let current = session.get_execution(execution.id).unwrap().unwrap();
    assert_eq!(current.steps_completed, 1);
    assert_eq!(current.status, ExecutionStatus::Running);
}

#[test]
fn lease_admits_one_holder_until_released_or_expired() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();
    let agent = session.create_agent("a", None, None).unwrap();
    let execution = session.create_execution(agent.id, "run").unwrap();

    assert!(session.claim_lease(execution.id, 0, "slot-a", Duration::from_secs(60)).unwrap());
    assert!(!session.claim_lease(execution.id, 0, "slot-b", Duration::from_secs(60)).unwrap());

    session.release_lease(execution.id, "slot-b").unwrap();
    assert!(!session.claim_lease(execution.id, 0, "slot-b", Duration::from_secs(60)).unwrap());

    session.release_lease(execution.id, "slot-a").unwrap();
    assert!(session.claim_lease(execution.id, 0, "slot-b", Duration::ZERO).unwrap());

    std::thread::sleep(Duration::from_millis(5));
    assert!(session.claim_lease(execution.id, 0, "slot-c", Duration::from_secs(60)).unwrap());
}

#[test]
fn lease_is_only_granted_for_the_current_step() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();
    let agent = session.create_agent("a", None, None).unwrap();
    let execution = session.create_execution(agent.id, "run").unwrap();

    assert!(!session.claim_lease(execution.id, 1, "ahead", Duration::from_secs(60)).unwrap());

    assert!(session.claim_lease(execution.id, 0, "first", Duration::from_secs(60)).unwrap());
    session.mark_running(execution.id).unwrap();
    session.record_step(execution.id, 0, StepOutcome::Continue).unwrap();
    session.release_lease(execution.id, "first").unwrap();

    assert!(!session.claim_lease(execution.id, 0, "replay", Duration::from_secs(60)).unwrap());
    assert!(session.claim_lease(execution.id, 1, "second", Duration::from_secs(60)).unwrap());
    session.release_lease(execution.id, "second").unwrap();

    assert!(session.cancel_execution(execution.id).unwrap());
    assert!(!session.claim_lease(execution.id, 1, "late", Duration::from_secs(60)).unwrap());
}

#[test]
fn configuration_rows_are_upserted_in_order() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();
    let agent = session.create_agent("a", None, None).unwrap();

    session.set_configuration(agent.id, "goal", r#"["first"]"#).unwrap();
    session.set_configuration(agent.id, "model", "gpt-4").unwrap();
    session.set_configuration(agent.id, "goal", r#"["second"]"#).unwrap();

    let entries = session.configuration_entries(agent.id).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, "goal");
    assert_eq!(entries[0].value, r#"["second"]"#);
    assert_eq!(entries[1].key, "model");
}

#[test]
fn legacy_configuration_values_are_upgraded() {
    let (dir, store) = open_store();
    let session = store.session().unwrap();
    let agent = session.create_agent("a", None, None).unwrap();
    drop(session);

    let raw = rusqlite::Connection::open(dir.path().join("stepwise.db")).unwrap();
    raw.execute(
        "INSERT INTO agent_configurations (agent_id, key, value, schema_version) VALUES
            (?1, 'goal', '[''find X'', ''report'']', 0),
            (?1, 'constraints', 'garbage', 0),
            (?1, 'model', 'gpt-4', 0)",
        [agent.id.get()],
    )
    .unwrap();
    drop(raw);

    let session = store.session().unwrap();
    assert_eq!(session.upgrade_configuration_values().unwrap(), 2);

    let entries = session.configuration_entries(agent.id).unwrap();
    let goal = entries.iter().find(|e| e.key == "goal").unwrap();
    assert_eq!(goal.value, r#"["find X","report"]"#);
    assert_eq!(goal.schema_version, 1);
    let constraints = entries.iter().find(|e| e.key == "constraints").unwrap();
    assert_eq!(constraints.schema_version, 0);
}

#[test]
fn tool_descriptors_round_trip() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();

    let registered = session
        .register_tool("GithubRepo Search", "GithubRepoSearchTool", "github", "search_repo.rs")
        .unwrap();
    let loaded = session.tool_descriptor(registered.id).unwrap().unwrap();
    assert_eq!(loaded, registered);
    assert!(session.tool_descriptor(ToolId::new(999)).unwrap().is_none());
    assert_eq!(session.list_tool_descriptors().unwrap().len(), 1);
}

#[test]
fn missing_rows_are_reported() {
    let (_dir, store) = open_store();
    let session = store.session().unwrap();

    assert!(session.get_agent(AgentId::new(42)).unwrap().is_none());
    assert!(session.get_execution(ExecutionId::new(42)).unwrap().is_none());
    assert!(matches!(
        session.create_execution(AgentId::new(42), "orphan"),
        Err(StoreError::NotFound { entity: "agent", id: 42 })
    ));
}

#[test]
fn sessions_release_their_connection() {
    let (_dir, store) = open_store();
    {
        let _a = store.session().unwrap();
        let _b = store.session().unwrap();
        assert_eq!(store.active_sessions(), 2);
        assert!(store.session().is_err());
    }
    assert_eq!(store.active_sessions(), 0);
    assert_eq!(store.schema_version().unwrap(), 3);
}
