//! Configuration management module
//!
//! Provides centralized configuration including:
//! - Data and log file paths under `$HOME/.todo-assistant/`
//! - User settings from `config.json` (assistant provider, model, API key)
//! - Build information (version)
//!
//! `TODO_ASSISTANT_HOME` overrides the base directory.

use crate::assistant::{AssistantConfig, ProviderKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration manager
pub struct Config;

impl Config {
    /// Base directory for everything the app writes.
    ///
    /// `$TODO_ASSISTANT_HOME` if set, else `$HOME/.todo-assistant`,
    /// else a directory under the system temp dir.
    pub fn base_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("TODO_ASSISTANT_HOME") {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".todo-assistant");
        }
        std::env::temp_dir().join("todo-assistant")
    }

    /// Get the log file path: `<base>/debug.log`
    pub fn log_file_path() -> PathBuf {
        Self::base_dir().join("debug.log")
    }

    /// Ensure the log directory exists
    pub fn ensure_log_directory() -> std::io::Result<()> {
        let log_path = Self::log_file_path();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Get the config file path: `<base>/config.json`
    pub fn config_file_path() -> PathBuf {
        Self::base_dir().join("config.json")
    }

    /// Task store file: `<base>/todos.json`
    pub fn todos_file_path() -> PathBuf {
        Self::base_dir().join("todos.json")
    }

    /// Chat history directory: `<base>/chat/`
    /// Files: chat-<user>-<session>.json
    pub fn chat_dir() -> PathBuf {
        Self::base_dir().join("chat")
    }

    /// Ensure the chat directory exists.
    pub fn ensure_chat_directory() -> std::io::Result<()> {
        std::fs::create_dir_all(Self::chat_dir())
    }

    /// Get the version string
    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

/// User settings stored in `config.json`. Every field is optional on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_user_id")]
    pub user_id: u64,
    /// Seconds before a single store call inside a batch is abandoned.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_user_id() -> u64 {
    1
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            api_key: None,
            endpoint: None,
            user_id: default_user_id(),
            command_timeout_secs: default_command_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from `Config::config_file_path()`. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Config::config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config: {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(settings)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    /// API key from the config file, else from the provider's environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        let from_file = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        if from_file.is_some() {
            return from_file;
        }
        match std::env::var(self.provider.api_key_env()) {
            Ok(k) if !k.trim().is_empty() => Some(k.trim().to_string()),
            _ => {
                warn!(
                    "Config: no API key in config.json and {} is not set",
                    self.provider.api_key_env()
                );
                None
            }
        }
    }

    /// Build the assistant configuration. Fails when no API key is available.
    pub fn assistant_config(&self) -> Result<AssistantConfig> {
        let api_key = self.resolve_api_key().with_context(|| {
            format!(
                "No API key for {}: set apiKey in {:?} or {}",
                self.provider.label(),
                Config::config_file_path(),
                self.provider.api_key_env()
            )
        })?;
        let config = AssistantConfig {
            provider: self.provider,
            model: self
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.provider.default_model().to_string()),
            api_key,
            endpoint: self
                .endpoint
                .clone()
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| self.provider.default_endpoint().to_string()),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        };
        config.validate()?;
        Ok(config)
    }
}
