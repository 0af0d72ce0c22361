//! Configuration loading and resolution
//!
//! The whole configuration is built once at startup into a [`MonitorConfig`] and
//! passed by reference into the registry client, the engines and the store.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--config`, `--database`)
//! 2. Environment variables (`JMON_CONFIG`, `JMON_DATABASE`, `JMON_ENGINE`,
//!    `JMON_LLM_API_KEY`, `OPENAI_API_KEY`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_CONFIG_PATH: &str = "JMON_CONFIG";
pub const ENV_DATABASE_PATH: &str = "JMON_DATABASE";
pub const ENV_ENGINE: &str = "JMON_ENGINE";
pub const ENV_LLM_API_KEY: &str = "JMON_LLM_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Default registry endpoint (Rama Judicial public query API, v2)
pub const DEFAULT_REGISTRY_BASE_URL: &str = "https://consultaprocesos.ramajudicial.gov.co:448/api/v2";

/// Complete runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where the file layer came from; set by [`MonitorConfig::resolve`]
    #[serde(skip)]
    pub source: ConfigSource,
}

/// Origin of the file layer of a resolved configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file found; built-in defaults
    #[default]
    Defaults,
    File(PathBuf),
}

/// Registry HTTP client settings
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_registry_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Strategy used by both the classification and the summarization engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineStrategy {
    /// Deterministic keyword rules and template summaries
    #[default]
    RuleBased,
    /// External language model, degrading to fixed fallbacks on failure
    ModelBacked,
}

impl std::str::FromStr for EngineStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rule_based" | "rules" => Ok(EngineStrategy::RuleBased),
            "model_backed" | "model" | "llm" => Ok(EngineStrategy::ModelBacked),
            other => Err(Error::Config(format!("Unknown engine strategy: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub strategy: EngineStrategy,
}

/// Chat-completion collaborator settings
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Bearer key; model-backed engines fall back to their defaults without one
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// Multi-page search settings
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on pages fetched by an all-pages search
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("judicial_monitor.db")
}

fn default_registry_base_url() -> String {
    DEFAULT_REGISTRY_BASE_URL.to_string()
}

fn default_registry_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("jmon/{}", env!("CARGO_PKG_VERSION"))
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_llm_temperature() -> f32 {
    0.3
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_max_pages() -> u32 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_base_url(),
            timeout_secs: default_registry_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            registry: RegistryConfig::default(),
            engine: EngineConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
            source: ConfigSource::Defaults,
        }
    }
}

impl MonitorConfig {
    /// Parse a TOML document; missing sections and fields take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Resolve the full configuration following the priority order in the module docs
    ///
    /// A missing config file is not an error: defaults are used and `source` is
    /// [`ConfigSource::Defaults`]. An explicitly named file that does not exist is
    /// an error. Nothing is logged here, since this runs before the subscriber is
    /// installed; see [`MonitorConfig::log_resolution`].
    pub fn resolve(cli_config: Option<&Path>, cli_database: Option<&Path>) -> Result<Self> {
        let explicit = cli_config
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from));

        let file = match explicit {
            Some(path) => Some(path),
            None => default_config_file().filter(|path| path.exists()),
        };

        let mut config = match file {
            Some(path) => {
                let mut config = Self::from_file(&path)?;
                config.source = ConfigSource::File(path);
                config
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;

        if let Some(db) = cli_database {
            config.database_path = db.to_path_buf();
        }

        Ok(config)
    }

    /// Apply environment variable overrides on top of file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var(ENV_DATABASE_PATH) {
            if !path.trim().is_empty() {
                self.database_path = PathBuf::from(path);
            }
        }

        if let Ok(strategy) = std::env::var(ENV_ENGINE) {
            self.engine.strategy = strategy.parse()?;
        }

        let env_key = [ENV_LLM_API_KEY, ENV_OPENAI_API_KEY]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|key| is_valid_key(key));
        if let Some(key) = env_key {
            self.llm.api_key = Some(key);
        }

        Ok(())
    }

    /// Log how the configuration was resolved; call once tracing is set up
    pub fn log_resolution(&self) {
        match &self.source {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults => warn!("No configuration file found, using built-in defaults"),
        }
        info!(
            database = %self.database_path.display(),
            registry = %self.registry.base_url,
            engine = ?self.engine.strategy,
            llm_key = self.llm.api_key.is_some(),
            "Configuration resolved"
        );
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Default config file location (`<config_dir>/jmon/config.toml`)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("jmon").join("config.toml"))
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("jmon"))
        .unwrap_or_else(|| PathBuf::from("./jmon_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.registry.timeout_secs, 30);
        assert_eq!(config.registry.base_url, DEFAULT_REGISTRY_BASE_URL);
        assert_eq!(config.engine.strategy, EngineStrategy::RuleBased);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert!(config.llm.api_key.is_none());
        assert!(config.database_path.ends_with("judicial_monitor.db"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
            database_path = "/tmp/monitor.db"

            [engine]
            strategy = "model_backed"

            [llm]
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/monitor.db"));
        assert_eq!(config.engine.strategy, EngineStrategy::ModelBacked);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.registry.timeout_secs, 30);
        assert_eq!(config.search.max_pages, 50);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = MonitorConfig::from_toml_str("database_path = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("rule-based".parse::<EngineStrategy>().unwrap(), EngineStrategy::RuleBased);
        assert_eq!("LLM".parse::<EngineStrategy>().unwrap(), EngineStrategy::ModelBacked);
        assert!("magic".parse::<EngineStrategy>().is_err());
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("sk-123"));
        assert!(!is_valid_key("   "));
        assert!(!is_valid_key(""));
    }
}
