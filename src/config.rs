use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sync::CheckpointPolicy;

/// Main configuration structure for Commitpress
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Durable storage settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// GitHub authentication settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Language-model provider settings
    #[serde(default)]
    pub ai: AiConfig,

    /// Publishing network settings
    #[serde(default)]
    pub publishing: PublishingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Durable storage configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite database file location
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// HTTP API configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow any origin (dashboard served from a separate dev server)
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token"

    /// Explicit token (overrides GITHUB_TOKEN and gh CLI detection)
    pub token: Option<String>,

    /// Override the GitHub API base URI (testing, GHE)
    pub api_base: Option<String>,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Lookback window in days for repositories with no checkpoint
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Timeout for each outbound fetch in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// When to advance a repository's checkpoint after a sync pass
    #[serde(default)]
    pub checkpoint_policy: CheckpointPolicy,
}

/// Language-model provider configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AiConfig {
    /// Chat-completions API base
    #[serde(default = "default_ai_api_base")]
    pub api_base: String,

    /// Model identifier
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_ai_token_env")]
    pub token_env: String,

    /// Upper bound on commits included in one summary prompt
    #[serde(default = "default_max_prompt_commits")]
    pub max_prompt_commits: usize,
}

/// Publishing network configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PublishingConfig {
    /// Enable the publish endpoint
    #[serde(default)]
    pub enabled: bool,

    /// Publishing network API endpoint
    #[serde(default)]
    pub endpoint: String,

    /// Network display name, recorded on published posts
    #[serde(default = "default_network")]
    pub network: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_db_path() -> String {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        format!("{}/commitpress/commitpress.db", data_home)
    } else if let Ok(home) = std::env::var("HOME") {
        format!("{}/.local/share/commitpress/commitpress.db", home)
    } else {
        "/tmp/commitpress.db".to_string()
    }
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_lookback_days() -> i64 {
    7
}
fn default_request_timeout() -> u64 {
    30
}
fn default_ai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_ai_token_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_prompt_commits() -> usize {
    50
}
fn default_network() -> String {
    "chainfeed".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: default_true(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            token: None,
            api_base: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            request_timeout_secs: default_request_timeout(),
            checkpoint_policy: CheckpointPolicy::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_base: default_ai_api_base(),
            model: default_ai_model(),
            token_env: default_ai_token_env(),
            max_prompt_commits: default_max_prompt_commits(),
        }
    }
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            network: default_network(),
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

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            // Create default config
            let config = Self::default();

            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            // Save default config
            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("commitpress").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.database.path = shellexpand::full(&self.database.path)
            .context("Failed to expand database path")?
            .into_owned();

        Ok(())
    }

    /// Lookback window applied when a repository has no checkpoint yet
    pub fn bootstrap_lookback(&self) -> chrono::Duration {
        chrono::Duration::days(self.sync.lookback_days)
    }

    /// Per-request timeout for outbound fetches
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync.request_timeout_secs)
    }
}
