//! Typed projection of an agent's raw configuration rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::schema::{ConfigKey, ValueKind};
use super::upgrade::upgrade_value;
use crate::error::ConfigParseError;
use crate::identifiers::{AgentId, ExecutionId, ProjectId, ToolId};
use crate::model::{Agent, AgentConfigurationEntry};

/// Configuration of one execution step.
///
/// Rebuilt from persisted rows on every step and never persisted itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedConfiguration {
    pub agent_id: AgentId,
    pub agent_execution_id: ExecutionId,
    pub name: String,
    pub description: Option<String>,
    pub project_id: Option<ProjectId>,
    pub goal: Vec<String>,
    pub constraints: Vec<String>,
    /// Custom tool ids in configured order, without duplicates.
    pub tools: Vec<ToolId>,
    pub exit: Option<String>,
    pub iteration_interval: Option<i64>,
    pub model: Option<String>,
    pub permission_type: Option<String>,
    #[serde(rename = "LTM_DB")]
    pub ltm_db: Option<String>,
    pub memory_window: Option<i64>,
    pub agent_type: Option<String>,
}

impl MaterializedConfiguration {
    /// Defaults for an agent with no configuration rows.
    pub fn defaults(agent: &Agent, execution_id: ExecutionId) -> Self {
        Self {
            agent_id: agent.id,
            agent_execution_id: execution_id,
            name: agent.name.clone(),
            description: agent.description.clone(),
            project_id: agent.project_id,
            goal: Vec::new(),
            constraints: Vec::new(),
            tools: Vec::new(),
            exit: None,
            iteration_interval: None,
            model: None,
            permission_type: None,
            ltm_db: None,
            memory_window: None,
            agent_type: None,
        }
    }
}

/// Builds a [`MaterializedConfiguration`] from an agent and its rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationMaterializer;

impl ConfigurationMaterializer {
    pub fn new() -> Self {
        Self
    }

    /// Apply every recognised row on top of the agent defaults.
    ///
    /// Unknown keys are skipped and a blank text value counts as unset.
    /// Any other value must parse as its key's kind: the first malformed
    /// one, blank lists and numbers included, fails the whole
    /// materialization.
    pub fn materialize(
        &self,
        agent: &Agent,
        execution_id: ExecutionId,
        entries: &[AgentConfigurationEntry],
    ) -> Result<MaterializedConfiguration, ConfigParseError> {
        let mut config = MaterializedConfiguration::defaults(agent, execution_id);

        for entry in entries {
            let Some(key) = ConfigKey::from_key(&entry.key) else {
                debug!(agent_id = %agent.id, key = %entry.key, "ignoring unknown configuration key");
                continue;
            };
            let raw = upgrade_value(key, &entry.value, entry.schema_version)?;
            if matches!(key.kind(), ValueKind::Text) && raw.trim().is_empty() {
                continue;
            }
            apply(&mut config, key, &raw)?;
        }

        Ok(config)
    }
}

fn apply(config: &mut MaterializedConfiguration, key: ConfigKey, raw: &str) -> Result<(), ConfigParseError> {
    match key.kind() {
        ValueKind::TextList => {
            let list = parse_text_list(key, raw)?;
            match key {
                ConfigKey::Goal => config.goal = list,
                _ => config.constraints = list,
            }
        }
        ValueKind::IdList => config.tools = parse_id_list(key, raw)?,
        ValueKind::Integer => {
            let value = parse_integer(key, raw)?;
            match key {
                ConfigKey::ProjectId => config.project_id = Some(ProjectId::new(value)),
                ConfigKey::IterationInterval => config.iteration_interval = Some(value),
                _ => config.memory_window = Some(value),
            }
        }
        ValueKind::Text => {
            let value = raw.to_string();
            match key {
                ConfigKey::Name => config.name = value,
                ConfigKey::Description => config.description = Some(value),
                ConfigKey::Exit => config.exit = Some(value),
                ConfigKey::Model => config.model = Some(value),
                ConfigKey::PermissionType => config.permission_type = Some(value),
                ConfigKey::LtmDb => config.ltm_db = Some(value),
                _ => config.agent_type = Some(value),
            }
        }
    }
    Ok(())
}

fn parse_list(key: ConfigKey, raw: &str) -> Result<Vec<Value>, ConfigParseError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(ConfigParseError::new(
            key.as_str(),
            raw,
            format!("expected a JSON list, found {}", json_type(&other)),
        )),
        Err(e) => Err(ConfigParseError::new(key.as_str(), raw, format!("expected a JSON list: {}", e))),
    }
}

fn parse_text_list(key: ConfigKey, raw: &str) -> Result<Vec<String>, ConfigParseError> {
    parse_list(key, raw)?
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(ConfigParseError::new(
                key.as_str(),
                raw,
                format!("list element {} is not a string", other),
            )),
        })
        .collect()
}

fn parse_id_list(key: ConfigKey, raw: &str) -> Result<Vec<ToolId>, ConfigParseError> {
    let mut ids: Vec<ToolId> = Vec::new();
    for item in parse_list(key, raw)? {
        let id = match &item {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            ConfigParseError::new(key.as_str(), raw, format!("list element {} is not a tool id", item))
        })?;
        let id = ToolId::new(id);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn parse_integer(key: ConfigKey, raw: &str) -> Result<i64, ConfigParseError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| ConfigParseError::new(key.as_str(), raw, e))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
