//! Settings loaded from the process environment and a TOML file.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use stepwise_memory::LtmBackend;
use stepwise_worker::{SettingsError, WorkerSettings};

fn set_env(key: &str, value: &str) {
    unsafe {
        env::set_var(key, value);
    }
}

fn clear_all_stepwise_env_vars() {
    for (key, _) in env::vars() {
        if key.starts_with("STEPWISE_") {
            unsafe {
                env::remove_var(key);
            }
        }
    }
}

#[test]
#[serial]
fn defaults_when_no_vars_set() {
    clear_all_stepwise_env_vars();

    let settings = WorkerSettings::from_env().expect("defaults should load");
    assert_eq!(settings.queue_name, "stepwise");
    assert_eq!(settings.memory.default_backend, LtmBackend::Sqlite);
    assert!(settings.openai_api_key.is_none());
}

#[test]
#[serial]
fn env_values_override_defaults() {
    clear_all_stepwise_env_vars();
    set_env("STEPWISE_DATABASE_PATH", "/var/lib/stepwise/state.db");
    set_env("STEPWISE_BROKER_URL", "memory://");
    set_env("STEPWISE_WORKER_CONCURRENCY", "8");
    set_env("STEPWISE_STEP_DELAY", "30s");
    set_env("STEPWISE_LTM_DEFAULT", "memory");
    set_env("STEPWISE_OPENAI_API_KEY", "sk-test");

    let settings = WorkerSettings::from_env().expect("settings should load");
    assert_eq!(settings.database_path, PathBuf::from("/var/lib/stepwise/state.db"));
    assert_eq!(settings.broker_url, "memory://");
    assert_eq!(settings.concurrency, 8);
    assert_eq!(settings.step_delay, Duration::from_secs(30));
    assert_eq!(settings.memory.default_backend, LtmBackend::InMemory);
    assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
    assert_eq!(settings.worker_pool_size(), 8);

    clear_all_stepwise_env_vars();
}

#[test]
#[serial]
fn invalid_env_value_is_reported() {
    clear_all_stepwise_env_vars();
    set_env("STEPWISE_LEASE_TTL", "forever");

    let err = WorkerSettings::from_env().unwrap_err();
    assert!(matches!(err, SettingsError::InvalidEnvVar { ref key, .. } if key == "STEPWISE_LEASE_TTL"));

    clear_all_stepwise_env_vars();
}

#[test]
#[serial]
fn config_file_is_overridden_by_env() {
    clear_all_stepwise_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stepwise.toml");
    std::fs::write(
        &path,
        "queue_name = \"agents\"\nworker_concurrency = 2\nstep_delay = \"1m\"\n",
    )
    .unwrap();
    set_env("STEPWISE_CONFIG_FILE", path.to_str().unwrap());
    set_env("STEPWISE_WORKER_CONCURRENCY", "6");

    let settings = WorkerSettings::from_env().expect("settings should load");
    assert_eq!(settings.queue_name, "agents");
    assert_eq!(settings.concurrency, 6);
    assert_eq!(settings.step_delay, Duration::from_secs(60));

    clear_all_stepwise_env_vars();
}

#[test]
fn nested_tables_in_the_file_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stepwise.toml");
    std::fs::write(&path, "[memory]\nbackend = \"sqlite\"\n").unwrap();

    assert!(matches!(
        WorkerSettings::from_file(&path),
        Err(SettingsError::File { .. })
    ));
}
