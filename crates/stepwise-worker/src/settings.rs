//! # Worker Settings
//!
//! Settings are read from `STEPWISE_*` environment variables. When
//! `STEPWISE_CONFIG_FILE` names a TOML file, its top-level keys provide the
//! base values (`queue_name = "agents"` is `STEPWISE_QUEUE_NAME`) and the
//! environment overrides them.
//!
//! ## Variables
//!
//! ### Store and queue
//! - `STEPWISE_DATABASE_PATH` - SQLite database (default: `stepwise.db`)
//! - `STEPWISE_DB_POOL_SIZE` - Pooled connections (default: 4)
//! - `STEPWISE_BROKER_URL` - `redis://...` or `memory://` (default: `redis://localhost:6379`)
//! - `STEPWISE_QUEUE_NAME` - Queue name (default: `stepwise`)
//!
//! ### Worker
//! - `STEPWISE_WORKER_CONCURRENCY` - Worker slots (default: 4)
//! - `STEPWISE_STEP_DELAY` - Delay between steps when the agent sets no
//!   `iteration_interval` (default: `10s`)
//! - `STEPWISE_RECEIVE_TIMEOUT` - Broker poll timeout (default: `1s`)
//! - `STEPWISE_LEASE_TTL` - Step lease lifetime (default: `10m`)
//!
//! Durations accept `humantime` strings (`90s`, `2m 30s`) or plain seconds.
//!
//! ### Long-term memory
//! - `STEPWISE_LTM_DEFAULT` - Backend for unset or unknown `LTM_DB` (default: `sqlite`)
//! - `STEPWISE_LTM_PATH` - SQLite vector store (default: `stepwise-ltm.db`)
//! - `STEPWISE_LTM_REDIS_URL` - Redis vector store
//!
//! ### Model
//! - `STEPWISE_OPENAI_API_KEY`, `STEPWISE_OPENAI_BASE_URL`
//!
//! ### Tools
//! - `STEPWISE_RESOURCES_DIR`, `STEPWISE_MAILDIR`, `STEPWISE_EMAIL_ADDRESS`
//! - `STEPWISE_GOOGLE_API_KEY`, `STEPWISE_GOOGLE_SEARCH_ENGINE_ID`
//! - `STEPWISE_JIRA_URL`, `STEPWISE_JIRA_USER`, `STEPWISE_JIRA_TOKEN`
//! - `STEPWISE_GITHUB_TOKEN`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepwise_memory::{LtmBackend, MemorySettings};
use stepwise_tools::ToolSettings;

/// Prefix shared by every settings variable.
pub const ENV_PREFIX: &str = "STEPWISE_";

/// Variable naming the optional TOML settings file.
pub const CONFIG_FILE_VAR: &str = "STEPWISE_CONFIG_FILE";

/// Error type for settings loading
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Cannot load settings file {path}: {message}")]
    File { path: PathBuf, message: String },

    #[error("Settings validation failed: {0}")]
    ValidationError(String),
}

/// Result type for settings loading
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Process-wide settings of a worker or CLI invocation.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub database_path: PathBuf,
    pub db_pool_size: usize,
    pub broker_url: String,
    pub queue_name: String,
    pub concurrency: usize,
    pub step_delay: Duration,
    pub receive_timeout: Duration,
    pub lease_ttl: Duration,
    pub memory: MemorySettings,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub tools: ToolSettings,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("stepwise.db"),
            db_pool_size: 4,
            broker_url: "redis://localhost:6379".to_string(),
            queue_name: "stepwise".to_string(),
            concurrency: 4,
            step_delay: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(1),
            lease_ttl: Duration::from_secs(600),
            memory: MemorySettings::default(),
            openai_api_key: None,
            openai_base_url: None,
            tools: ToolSettings::default(),
        }
    }
}

impl WorkerSettings {
    /// Load from the process environment and the file it may name.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the file cannot be read or any value is
    /// invalid.
    pub fn from_env() -> SettingsResult<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        Self::from_vars(vars)
    }

    /// Load from an explicit set of `STEPWISE_*` variables.
    pub fn from_vars(vars: HashMap<String, String>) -> SettingsResult<Self> {
        let mut values = match vars.get(CONFIG_FILE_VAR) {
            Some(path) if !path.trim().is_empty() => read_file(Path::new(path.trim()))?,
            _ => HashMap::new(),
        };
        values.extend(vars);
        Self::from_values(&values)
    }

    /// Load from a TOML file alone.
    pub fn from_file(path: impl AsRef<Path>) -> SettingsResult<Self> {
        Self::from_values(&read_file(path.as_ref())?)
    }

    fn from_values(values: &HashMap<String, String>) -> SettingsResult<Self> {
        let mut settings = Self::default();
        let vars = Vars(values);

        if let Some(path) = vars.string("STEPWISE_DATABASE_PATH") {
            settings.database_path = PathBuf::from(path);
        }
        if let Some(size) = vars.usize("STEPWISE_DB_POOL_SIZE")? {
            settings.db_pool_size = size;
        }
        if let Some(url) = vars.string("STEPWISE_BROKER_URL") {
            settings.broker_url = url;
        }
        if let Some(name) = vars.string("STEPWISE_QUEUE_NAME") {
            settings.queue_name = name;
        }
        if let Some(concurrency) = vars.usize("STEPWISE_WORKER_CONCURRENCY")? {
            settings.concurrency = concurrency;
        }
        if let Some(delay) = vars.duration("STEPWISE_STEP_DELAY")? {
            settings.step_delay = delay;
        }
        if let Some(timeout) = vars.duration("STEPWISE_RECEIVE_TIMEOUT")? {
            settings.receive_timeout = timeout;
        }
        if let Some(ttl) = vars.duration("STEPWISE_LEASE_TTL")? {
            settings.lease_ttl = ttl;
        }

        if let Some(backend) = vars.backend("STEPWISE_LTM_DEFAULT")? {
            settings.memory.default_backend = backend;
        }
        if let Some(path) = vars.string("STEPWISE_LTM_PATH") {
            settings.memory.sqlite_path = PathBuf::from(path);
        }
        settings.memory.redis_url = vars.string("STEPWISE_LTM_REDIS_URL");
        if let Some(capacity) = vars.usize("STEPWISE_LTM_FALLBACK_CAPACITY")? {
            settings.memory.fallback_capacity = capacity;
        }

        settings.openai_api_key = vars.string("STEPWISE_OPENAI_API_KEY");
        settings.openai_base_url = vars.string("STEPWISE_OPENAI_BASE_URL");

        let tools = &mut settings.tools;
        if let Some(dir) = vars.string("STEPWISE_RESOURCES_DIR") {
            tools.resources_dir = PathBuf::from(dir);
        }
        if let Some(dir) = vars.string("STEPWISE_MAILDIR") {
            tools.maildir = PathBuf::from(dir);
        }
        tools.email_address = vars.string("STEPWISE_EMAIL_ADDRESS");
        tools.google_api_key = vars.string("STEPWISE_GOOGLE_API_KEY");
        tools.google_search_engine_id = vars.string("STEPWISE_GOOGLE_SEARCH_ENGINE_ID");
        tools.jira_url = vars.string("STEPWISE_JIRA_URL");
        tools.jira_user = vars.string("STEPWISE_JIRA_USER");
        tools.jira_token = vars.string("STEPWISE_JIRA_TOKEN");
        tools.github_token = vars.string("STEPWISE_GITHUB_TOKEN");

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::ValidationError` naming the first bad value.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.db_pool_size == 0 {
            return Err(SettingsError::ValidationError(
                "db_pool_size must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(SettingsError::ValidationError(
                "worker concurrency must be greater than 0".to_string(),
            ));
        }
        if self.queue_name.trim().is_empty() {
            return Err(SettingsError::ValidationError("queue_name cannot be empty".to_string()));
        }
        if self.receive_timeout.is_zero() {
            return Err(SettingsError::ValidationError(
                "receive_timeout must be greater than 0".to_string(),
            ));
        }
        if self.lease_ttl < self.receive_timeout {
            return Err(SettingsError::ValidationError(
                "lease_ttl must not be shorter than receive_timeout".to_string(),
            ));
        }
        if self.memory.fallback_capacity == 0 {
            return Err(SettingsError::ValidationError(
                "ltm fallback_capacity must be greater than 0".to_string(),
            ));
        }
        if self.memory.default_backend == LtmBackend::Pinecone {
            return Err(SettingsError::ValidationError(
                "pinecone cannot be the default long-term memory backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Connections the worker needs: one per slot at least.
    pub fn worker_pool_size(&self) -> usize {
        self.db_pool_size.max(self.concurrency)
    }
}

/// Read a flat TOML table into `STEPWISE_*` keyed strings.
fn read_file(path: &Path) -> SettingsResult<HashMap<String, String>> {
    let file_error = |message: String| SettingsError::File {
        path: path.to_path_buf(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    let table: toml::Table = toml::from_str(&content).map_err(|e| file_error(e.to_string()))?;

    let mut values = HashMap::with_capacity(table.len());
    for (key, value) in table {
        let value = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(n) => n.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            other => {
                return Err(file_error(format!(
                    "key '{}' must be a string or number, found {}",
                    key,
                    other.type_str()
                )));
            }
        };
        values.insert(format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase()), value);
    }
    Ok(values)
}

struct Vars<'a>(&'a HashMap<String, String>);

impl Vars<'_> {
    fn string(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn usize(&self, key: &str) -> SettingsResult<Option<usize>> {
        self.string(key)
            .map(|value| {
                value.parse::<usize>().map_err(|e| SettingsError::InvalidEnvVar {
                    key: key.to_string(),
                    message: format!("invalid usize value '{value}': {e}"),
                })
            })
            .transpose()
    }

    fn duration(&self, key: &str) -> SettingsResult<Option<Duration>> {
        self.string(key)
            .map(|value| parse_duration(&value).map_err(|message| SettingsError::InvalidEnvVar {
                key: key.to_string(),
                message,
            }))
            .transpose()
    }

    fn backend(&self, key: &str) -> SettingsResult<Option<LtmBackend>> {
        self.string(key)
            .map(|value| {
                LtmBackend::parse(&value).ok_or_else(|| SettingsError::InvalidEnvVar {
                    key: key.to_string(),
                    message: format!("unknown backend '{value}', expected sqlite, redis or memory"),
                })
            })
            .transpose()
    }
}

/// `humantime` duration or a plain number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(value).map_err(|e| format!("invalid duration '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = WorkerSettings::from_vars(HashMap::new()).unwrap();
        assert_eq!(settings.database_path, PathBuf::from("stepwise.db"));
        assert_eq!(settings.broker_url, "redis://localhost:6379");
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.step_delay, Duration::from_secs(10));
        assert_eq!(settings.lease_ttl, Duration::from_secs(600));
        assert_eq!(settings.memory.default_backend, LtmBackend::Sqlite);
        assert!(settings.openai_api_key.is_none());
    }

    #[rstest]
    #[case("15", Duration::from_secs(15))]
    #[case("90s", Duration::from_secs(90))]
    #[case("2m 30s", Duration::from_secs(150))]
    #[case("250ms", Duration::from_millis(250))]
    fn durations_accept_seconds_and_humantime(#[case] raw: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(raw).unwrap(), expected);
    }

    #[test]
    fn invalid_values_name_their_key() {
        let err = WorkerSettings::from_vars(vars(&[("STEPWISE_STEP_DELAY", "soon")])).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnvVar { ref key, .. } if key == "STEPWISE_STEP_DELAY"));

        let err = WorkerSettings::from_vars(vars(&[("STEPWISE_LTM_DEFAULT", "chroma")])).unwrap_err();
        assert!(err.to_string().contains("STEPWISE_LTM_DEFAULT"));
    }

    #[test]
    fn validation_rejects_zero_concurrency_and_pinecone_default() {
        let err = WorkerSettings::from_vars(vars(&[("STEPWISE_WORKER_CONCURRENCY", "0")])).unwrap_err();
        assert!(matches!(err, SettingsError::ValidationError(_)));

        let err = WorkerSettings::from_vars(vars(&[("STEPWISE_LTM_DEFAULT", "pinecone")])).unwrap_err();
        assert!(err.to_string().contains("pinecone"));
    }

    #[test]
    fn fallback_capacity_is_configurable_and_positive() {
        let settings = WorkerSettings::from_vars(vars(&[("STEPWISE_LTM_FALLBACK_CAPACITY", "50")])).unwrap();
        assert_eq!(settings.memory.fallback_capacity, 50);
        assert_eq!(WorkerSettings::default().memory.fallback_capacity, 1000);

        let err = WorkerSettings::from_vars(vars(&[("STEPWISE_LTM_FALLBACK_CAPACITY", "0")])).unwrap_err();
        assert!(err.to_string().contains("fallback_capacity"));
    }

    #[test]
    fn pool_covers_every_slot() {
        let settings = WorkerSettings::from_vars(vars(&[
            ("STEPWISE_WORKER_CONCURRENCY", "8"),
            ("STEPWISE_DB_POOL_SIZE", "2"),
        ]))
        .unwrap();
        assert_eq!(settings.worker_pool_size(), 8);
    }
}
