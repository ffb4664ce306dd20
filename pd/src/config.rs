//! Plandeck configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main plandeck configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Interactive shell settings
    pub shell: ShellConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Log level (overridden by --log-level)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .plandeck.yml
        let local_config = PathBuf::from(".plandeck.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/plandeck/plandeck.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("plandeck").join("plandeck.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Turn natural-language features on or off
    pub enabled: bool,

    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 60_000,
        }
    }
}

/// Interactive shell settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Maximum lines kept in the history file
    #[serde(rename = "history-size")]
    pub history_size: usize,

    /// History file location
    #[serde(rename = "history-file")]
    pub history_file: PathBuf,

    /// Project-list cache lifetime in milliseconds
    #[serde(rename = "cache-ttl-ms")]
    pub cache_ttl_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history_size: 500,
            history_file: data_dir().join("history"),
            cache_ttl_ms: 5_000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for PlanStore data
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: data_dir() }
    }
}

/// XDG data directory (~/.local/share/plandeck on Linux)
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("plandeck"))
        .unwrap_or_else(|| PathBuf::from(".plandeck"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "anthropic");
        assert!(config.llm.enabled);
        assert_eq!(config.shell.history_size, 500);
        assert_eq!(config.shell.cache_ttl_ms, 5_000);
        assert!(config.shell.history_file.ends_with("history"));
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  enabled: false
  model: claude-opus-4
  api-key-env: MY_API_KEY
  timeout-ms: 120000

shell:
  history-size: 50
  cache-ttl-ms: 1000

storage:
  data-dir: /tmp/plans

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert!(!config.llm.enabled);
        assert_eq!(config.llm.model, "claude-opus-4");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.timeout_ms, 120_000);
        assert_eq!(config.shell.history_size, 50);
        assert_eq!(config.shell.cache_ttl_ms, 1000);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/plans"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: claude-haiku
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "claude-haiku");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.shell.history_size, 500);
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let missing = PathBuf::from("/nonexistent/plandeck.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
