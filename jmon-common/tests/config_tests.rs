//! Unit tests for configuration resolution
//!
//! Uses serial_test to prevent environment variable races: every test that
//! reads or writes JMON_* / OPENAI_API_KEY is marked #[serial].

use jmon_common::config::{
    ConfigSource, EngineStrategy, MonitorConfig, ENV_CONFIG_PATH, ENV_DATABASE_PATH, ENV_ENGINE, ENV_LLM_API_KEY,
    ENV_OPENAI_API_KEY,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    for var in [
        ENV_CONFIG_PATH,
        ENV_DATABASE_PATH,
        ENV_ENGINE,
        ENV_LLM_API_KEY,
        ENV_OPENAI_API_KEY,
    ] {
        env::remove_var(var);
    }
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_explicit_file_is_loaded() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        database_path = "/data/monitor.db"

        [registry]
        timeout_secs = 10
        "#,
    );

    let config = MonitorConfig::resolve(Some(&path), None).unwrap();
    assert_eq!(config.database_path, PathBuf::from("/data/monitor.db"));
    assert_eq!(config.registry.timeout_secs, 10);
    assert_eq!(config.source, ConfigSource::File(path));
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(MonitorConfig::resolve(Some(&missing), None).is_err());
}

#[test]
#[serial]
fn test_env_config_path_used_without_cli_flag() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[engine]\nstrategy = \"model_backed\"\n");
    env::set_var(ENV_CONFIG_PATH, &path);

    let config = MonitorConfig::resolve(None, None).unwrap();
    assert_eq!(config.engine.strategy, EngineStrategy::ModelBacked);

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_file_and_cli_overrides_env() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        database_path = "/from/toml.db"

        [llm]
        api_key = "toml-key"
        "#,
    );
    env::set_var(ENV_DATABASE_PATH, "/from/env.db");
    env::set_var(ENV_LLM_API_KEY, "env-key");
    env::set_var(ENV_ENGINE, "model_backed");

    let config = MonitorConfig::resolve(Some(&path), None).unwrap();
    assert_eq!(config.database_path, PathBuf::from("/from/env.db"));
    assert_eq!(config.llm.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.engine.strategy, EngineStrategy::ModelBacked);

    let cli_db = PathBuf::from("/from/cli.db");
    let config = MonitorConfig::resolve(Some(&path), Some(&cli_db)).unwrap();
    assert_eq!(config.database_path, cli_db);

    clear_env();
}

#[test]
#[serial]
fn test_openai_key_fallback_and_blank_key_ignored() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    env::set_var(ENV_OPENAI_API_KEY, "sk-openai");
    let config = MonitorConfig::resolve(Some(&path), None).unwrap();
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));

    env::set_var(ENV_OPENAI_API_KEY, "   ");
    let config = MonitorConfig::resolve(Some(&path), None).unwrap();
    assert!(config.llm.api_key.is_none());

    clear_env();
}

#[test]
#[serial]
fn test_blank_jmon_key_falls_back_to_openai_key() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[llm]\napi_key = \"toml-key\"\n");

    env::set_var(ENV_LLM_API_KEY, "");
    env::set_var(ENV_OPENAI_API_KEY, "sk-openai");
    let config = MonitorConfig::resolve(Some(&path), None).unwrap();
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));

    env::remove_var(ENV_OPENAI_API_KEY);
    let config = MonitorConfig::resolve(Some(&path), None).unwrap();
    assert_eq!(config.llm.api_key.as_deref(), Some("toml-key"));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_engine_env_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");
    env::set_var(ENV_ENGINE, "oracle");

    assert!(MonitorConfig::resolve(Some(&path), None).is_err());

    clear_env();
}
