//! Configuration management for xharvest

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// JSON cookie export from a logged-in browser
    #[serde(default = "default_cookie_file")]
    pub cookie_file: String,

    /// Name the session is registered under
    #[serde(default = "default_username")]
    pub username: String,

    /// Session pool file, rebuilt on every run
    #[serde(default = "default_store_path")]
    pub store_path: String,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Pause between accounts in a batch
    #[serde(default = "default_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Print a console preview when nothing is exported
    #[serde(default = "default_preview")]
    pub preview: bool,
}

fn default_cookie_file() -> String {
    "~/.config/xharvest/cookies.json".to_string()
}

fn default_username() -> String {
    "xharvest".to_string()
}

fn default_store_path() -> String {
    "~/.local/share/xharvest/accounts.toml".to_string()
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_rate_limit_delay_secs() -> f64 {
    2.0
}

fn default_preview() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_file: default_cookie_file(),
            username: default_username(),
            store_path: default_store_path(),
            user_agent: None,
            request_timeout_secs: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay_secs(),
            rate_limit_delay_secs: default_rate_limit_delay_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            preview: default_preview(),
        }
    }
}

impl SessionConfig {
    pub fn cookie_file_path(&self) -> PathBuf {
        expand_path(&self.cookie_file)
    }

    pub fn store_file_path(&self) -> PathBuf {
        expand_path(&self.store_path)
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.retry_count, self.retry_delay_secs)
    }

    /// Inter-account delay. Negative or non-finite values disable it.
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit_delay_secs).unwrap_or(Duration::ZERO)
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults; a file that exists but cannot be
    /// read or parsed is an error.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.session.username.trim().is_empty() {
            return Err(ConfigError::MissingField("session.username".to_string()));
        }
        if self.session.cookie_file.trim().is_empty() {
            return Err(ConfigError::MissingField("session.cookie_file".to_string()));
        }
        if self.session.store_path.trim().is_empty() {
            return Err(ConfigError::MissingField("session.store_path".to_string()));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("XHARVEST_CONFIG") {
        return Ok(expand_path(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("xharvest").join("config.toml"))
}
