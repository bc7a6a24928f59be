//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the backend URL, runtime environment, token storage
//! backend and last used login.
//!
//! Configuration is stored at `~/.config/taskdash/config.json`. Environment
//! variables (`TASKDASH_API_URL`, `TASKDASH_ENV`, `TASKDASH_TOKEN_STORAGE`)
//! override the file.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "taskdash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default page size for the task list
const DEFAULT_BATCH_SIZE: u32 = 10;

pub const ENV_API_URL: &str = "TASKDASH_API_URL";
pub const ENV_ENVIRONMENT: &str = "TASKDASH_ENV";
pub const ENV_TOKEN_STORAGE: &str = "TASKDASH_TOKEN_STORAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => bail!("Unknown environment '{}'", other),
        }
    }
}

/// Where the session tokens are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    #[default]
    File,
    Keyring,
}

impl FromStr for TokenStorage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(TokenStorage::File),
            "keyring" => Ok(TokenStorage::Keyring),
            other => bail!("Unknown token storage '{}'", other),
        }
    }
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub token_storage: TokenStorage,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    pub last_login: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            environment: Environment::default(),
            token_storage: TokenStorage::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            last_login: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults when absent), then apply environment
    /// overrides and validate.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = Some(url);
        }
        if let Some(env) = lookup(ENV_ENVIRONMENT) {
            self.environment = env.parse()?;
        }
        if let Some(storage) = lookup(ENV_TOKEN_STORAGE) {
            self.token_storage = storage.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = match self.api_url.as_deref().map(str::trim) {
            None | Some("") => bail!(
                "API URL is not configured; set {} or api_url in the config file",
                ENV_API_URL
            ),
            Some(url) => url,
        };
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("API URL must start with http:// or https://, got '{}'", url);
        }
        if self.batch_size == 0 {
            bail!("batch_size must be greater than zero");
        }
        Ok(())
    }

    /// Validated base URL without a trailing slash
    pub fn api_url(&self) -> Result<String> {
        self.validate()?;
        Ok(self
            .api_url
            .as_deref()
            .unwrap_or_default()
            .trim()
            .trim_end_matches('/')
            .to_string())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
