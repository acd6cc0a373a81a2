//! One-shot administration commands against the store and the broker.

use clap::Args;
use std::time::Duration;
use stepwise_core::{AgentExecution, AgentId, ConfigKey, ExecutionId, ExecutionStatus, ToolId, UnitOfWork};
use stepwise_store::SqliteStore;
use stepwise_tools::{BuiltinTool, ToolKey};
use stepwise_worker::{WorkerSettings, open_scheduler, open_store};
use tracing::info;

use crate::error::{CliError, CliResult};

/// Arguments of `create-agent`.
#[derive(Args, Debug, Default)]
pub struct NewAgent {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Goal of the agent; repeat for several
    #[arg(long = "goal")]
    pub goals: Vec<String>,
    #[arg(long = "constraint")]
    pub constraints: Vec<String>,
    /// Tool descriptor id; repeat for several
    #[arg(long = "tool")]
    pub tools: Vec<ToolId>,
    #[arg(long)]
    pub model: Option<String>,
    /// Long-term memory backend (sqlite, redis, memory)
    #[arg(long)]
    pub ltm_db: Option<String>,
    /// Seconds between steps
    #[arg(long)]
    pub iteration_interval: Option<i64>,
    /// Any other configuration row as `key=value`
    #[arg(long = "set", value_parser = parse_key_value)]
    pub extra: Vec<(String, String)>,
}

/// Arguments of `tools register`.
#[derive(Args, Debug)]
pub struct ToolRegistration {
    #[arg(long)]
    pub name: String,
    /// Class name the tool is registered under
    #[arg(long)]
    pub class: String,
    #[arg(long)]
    pub folder: String,
    #[arg(long)]
    pub file: String,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

fn json_list<T: serde::Serialize>(items: &[T]) -> CliResult<String> {
    serde_json::to_string(items).map_err(|e| CliError::Input(e.to_string()))
}

/// Configuration rows in their stored encoding: lists as JSON arrays,
/// scalars as plain text.
pub fn configuration_rows(new_agent: &NewAgent) -> CliResult<Vec<(String, String)>> {
    let mut rows = Vec::new();
    if !new_agent.goals.is_empty() {
        rows.push((ConfigKey::Goal.as_str().to_string(), json_list(&new_agent.goals)?));
    }
    if !new_agent.constraints.is_empty() {
        rows.push((ConfigKey::Constraints.as_str().to_string(), json_list(&new_agent.constraints)?));
    }
    if !new_agent.tools.is_empty() {
        let ids: Vec<i64> = new_agent.tools.iter().map(|id| id.get()).collect();
        rows.push((ConfigKey::Tools.as_str().to_string(), json_list(&ids)?));
    }
    if let Some(model) = &new_agent.model {
        rows.push((ConfigKey::Model.as_str().to_string(), model.clone()));
    }
    if let Some(ltm_db) = &new_agent.ltm_db {
        rows.push((ConfigKey::LtmDb.as_str().to_string(), ltm_db.clone()));
    }
    if let Some(interval) = new_agent.iteration_interval {
        rows.push((ConfigKey::IterationInterval.as_str().to_string(), interval.to_string()));
    }
    for (key, value) in &new_agent.extra {
        if ConfigKey::from_key(key).is_none() {
            return Err(CliError::Input(format!("unknown configuration key '{}'", key)));
        }
        rows.push((key.clone(), value.clone()));
    }
    Ok(rows)
}

pub fn migrate(settings: &WorkerSettings) -> CliResult<()> {
    let store = SqliteStore::open_unmigrated(&settings.database_path, settings.db_pool_size)?;
    let applied = store.migrate()?;
    let upgraded = store.session()?.upgrade_configuration_values()?;
    let version = store.schema_version()?;
    info!(applied, upgraded, version, "Store migrated");
    println!(
        "Schema version {} ({} migrations applied, {} configuration values upgraded)",
        version, applied, upgraded
    );
    Ok(())
}

pub fn create_agent(settings: &WorkerSettings, new_agent: &NewAgent) -> CliResult<()> {
    let rows = configuration_rows(new_agent)?;
    let store = open_store(settings)?;
    let session = store.session()?;
    let agent = session.create_agent(&new_agent.name, new_agent.description.as_deref(), None)?;
    for (key, value) in &rows {
        session.set_configuration(agent.id, key, value)?;
    }
    info!(agent_id = %agent.id, rows = rows.len(), "Agent created");
    println!("Created agent {} ({})", agent.id, agent.name);
    Ok(())
}

pub async fn start(settings: &WorkerSettings, agent_id: AgentId, name: Option<&str>) -> CliResult<()> {
    let execution = {
        let store = open_store(settings)?;
        let session = store.session()?;
        let agent = session
            .get_agent(agent_id)?
            .ok_or_else(|| CliError::Input(format!("no agent with id {}", agent_id)))?;
        let name = name.map_or_else(|| format!("{} run", agent.name), str::to_string);
        session.create_execution(agent.id, &name)?
    };

    let scheduler = open_scheduler(settings).await?;
    scheduler
        .schedule(UnitOfWork::immediate(execution.id, execution.steps_completed))
        .await?;
    println!("Started execution {} of agent {}", execution.id, agent_id);
    Ok(())
}

/// Enqueue the next step of a stalled execution. A unit that duplicates
/// one already queued is dropped by the worker as stale.
pub async fn enqueue(settings: &WorkerSettings, execution_id: ExecutionId, delay: Duration) -> CliResult<()> {
    let step = {
        let store = open_store(settings)?;
        let execution = store
            .session()?
            .get_execution(execution_id)?
            .ok_or_else(|| CliError::Input(format!("no execution with id {}", execution_id)))?;
        if execution.status.is_terminal() {
            return Err(CliError::Input(format!(
                "execution {} is {}, nothing to run",
                execution_id, execution.status
            )));
        }
        execution.steps_completed
    };

    let scheduler = open_scheduler(settings).await?;
    scheduler
        .schedule(UnitOfWork::delayed(execution_id, step, delay))
        .await?;
    println!("Enqueued step {} of execution {} (delay {}s)", step, execution_id, delay.as_secs());
    Ok(())
}

pub fn cancel(settings: &WorkerSettings, execution_id: ExecutionId) -> CliResult<()> {
    let store = open_store(settings)?;
    if store.session()?.cancel_execution(execution_id)? {
        info!(execution_id = %execution_id, "Execution cancelled");
        println!("Cancelled execution {}", execution_id);
        Ok(())
    } else {
        Err(CliError::Input(format!(
            "execution {} does not exist or is already terminal",
            execution_id
        )))
    }
}

pub fn status(
    settings: &WorkerSettings,
    execution_id: Option<ExecutionId>,
    status: Option<ExecutionStatus>,
) -> CliResult<()> {
    let store = open_store(settings)?;
    let session = store.session()?;
    match execution_id {
        Some(id) => {
            let execution = session
                .get_execution(id)?
                .ok_or_else(|| CliError::Input(format!("no execution with id {}", id)))?;
            println!("{}", describe(&execution));
            if let Some(error) = &execution.last_error {
                println!("  error: {}", error);
            }
        }
        None => {
            for execution in session.list_executions(status)? {
                println!("{}", describe(&execution));
            }
        }
    }
    Ok(())
}

pub fn describe(execution: &AgentExecution) -> String {
    let mut line = format!(
        "#{} agent={} {} steps={} name={:?}",
        execution.id, execution.agent_id, execution.status, execution.steps_completed, execution.name
    );
    if let Some(kind) = &execution.error_kind {
        line.push_str(&format!(" error_kind={}", kind));
    }
    line
}

pub fn list_tools(settings: &WorkerSettings) -> CliResult<()> {
    let store = open_store(settings)?;
    let builtin_keys: Vec<ToolKey> = BuiltinTool::ALL.iter().map(BuiltinTool::key).collect();

    println!("Registered descriptors:");
    for descriptor in store.session()?.list_tool_descriptors()? {
        let key = ToolKey::of(&descriptor);
        let origin = if builtin_keys.contains(&key) { "built-in" } else { "plugin" };
        println!("  {} {} [{}]", descriptor, descriptor.name, origin);
    }

    println!("Built-in keys:");
    for key in &builtin_keys {
        println!("  {}", key);
    }
    Ok(())
}

pub fn register_tool(settings: &WorkerSettings, registration: &ToolRegistration) -> CliResult<()> {
    let store = open_store(settings)?;
    let descriptor = store.session()?.register_tool(
        &registration.name,
        &registration.class,
        &registration.folder,
        &registration.file,
    )?;
    info!(tool_id = %descriptor.id, key = %ToolKey::of(&descriptor), "Tool descriptor registered");
    println!("Registered {}", descriptor);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs_split_on_first_equals() {
        assert_eq!(
            parse_key_value("exit=a=b").unwrap(),
            ("exit".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("no-separator").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn rows_use_stored_encoding() {
        let new_agent = NewAgent {
            name: "Researcher".into(),
            goals: vec!["Find \"quoted\" facts".into()],
            tools: vec![ToolId::new(3), ToolId::new(1)],
            ltm_db: Some("memory".into()),
            iteration_interval: Some(5),
            extra: vec![("permission_type".into(), "God Mode".into())],
            ..NewAgent::default()
        };

        let rows = configuration_rows(&new_agent).unwrap();
        assert_eq!(
            rows,
            vec![
                ("goal".to_string(), r#"["Find \"quoted\" facts"]"#.to_string()),
                ("tools".to_string(), "[3,1]".to_string()),
                ("LTM_DB".to_string(), "memory".to_string()),
                ("iteration_interval".to_string(), "5".to_string()),
                ("permission_type".to_string(), "God Mode".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_extra_keys_are_rejected() {
        let new_agent = NewAgent {
            name: "x".into(),
            extra: vec![("colour".into(), "blue".into())],
            ..NewAgent::default()
        };
        assert!(matches!(configuration_rows(&new_agent), Err(CliError::Input(_))));
    }

    #[test]
    fn created_agent_rows_materialize() {
        let dir = tempfile::tempdir().unwrap();
        let settings = WorkerSettings {
            database_path: dir.path().join("cli.db"),
            ..WorkerSettings::default()
        };
        let new_agent = NewAgent {
            name: "Writer".into(),
            goals: vec!["Draft".into(), "Edit".into()],
            ..NewAgent::default()
        };
        create_agent(&settings, &new_agent).unwrap();

        let store = open_store(&settings).unwrap();
        let session = store.session().unwrap();
        let agent = session.get_agent(AgentId::new(1)).unwrap().unwrap();
        let entries = session.configuration_entries(agent.id).unwrap();
        let config = stepwise_core::ConfigurationMaterializer::new()
            .materialize(&agent, ExecutionId::new(1), &entries)
            .unwrap();
        assert_eq!(config.goal, vec!["Draft".to_string(), "Edit".to_string()]);
    }
}
