use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RapportConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub prompt: PromptConfig,
    pub retry: RetryConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Namespace for every record this service writes into `plugin_data`.
    pub plugin_key: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PromptConfig {
    /// `EN` or `CN`.
    pub language: String,
    pub context_expire_seconds: i64,
    pub context_max_messages: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
}

impl Default for RapportConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            prompt: PromptConfig::default(),
            retry: RetryConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8931,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_rapport_dir()
            .join("rapport.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            plugin_key: "attitude".into(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            language: "EN".into(),
            context_expire_seconds: 3600,
            context_max_messages: 32,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_retries, self.base_delay_ms)
    }
}

/// Returns `~/.rapport/`
pub fn default_rapport_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rapport")
}

/// Returns the default config file path: `~/.rapport/config.toml`
pub fn default_config_path() -> PathBuf {
    default_rapport_dir().join("config.toml")
}

impl RapportConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RapportConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (RAPPORT_DB, RAPPORT_LOG_LEVEL, RAPPORT_PROMPT_LANGUAGE).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RAPPORT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("RAPPORT_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("RAPPORT_PROMPT_LANGUAGE") {
            self.prompt.language = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RapportConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.plugin_key, "attitude");
        assert_eq!(config.prompt.language, "EN");
        assert_eq!(config.retry.max_retries, 3);
        assert!(!config.api.enabled);
        assert!(config.storage.db_path.ends_with("rapport.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 9000

[storage]
db_path = "/tmp/test.db"

[prompt]
language = "CN"

[api]
enabled = true
"#;
        let config: RapportConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.prompt.language, "CN");
        assert!(config.api.enabled);
        // defaults still apply for unset fields
        assert_eq!(config.storage.plugin_key, "attitude");
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.prompt.context_max_messages, 32);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RapportConfig::default();
        std::env::set_var("RAPPORT_DB", "/tmp/override.db");
        std::env::set_var("RAPPORT_LOG_LEVEL", "trace");
        std::env::set_var("RAPPORT_PROMPT_LANGUAGE", "CN");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.prompt.language, "CN");

        // Clean up
        std::env::remove_var("RAPPORT_DB");
        std::env::remove_var("RAPPORT_LOG_LEVEL");
        std::env::remove_var("RAPPORT_PROMPT_LANGUAGE");
    }

    #[test]
    fn retry_policy_follows_config() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 20,
        };
        let policy = config.policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay_for(0).as_millis(), 20);
        assert_eq!(policy.delay_for(2).as_millis(), 80);
    }
}
