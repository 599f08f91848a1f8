//! Configuration management for chatstream
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.chatstream/config.toml

use crate::errors::{ChatError, Result};
use crate::history::DEFAULT_HISTORY_PATH;
use crate::streaming::transport::{
    DEFAULT_BASE_URL, DEFAULT_SESSION_STREAM_PATH, DEFAULT_TASK_STREAM_PATH,
};
use crate::streaming::{ConcurrencyPolicy, Endpoints, EventKind, EventMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for chatstream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub stream: StreamConfig,
    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub session_stream_path: String,
    pub task_stream_path: String,
    pub history_path: String,
    pub connect_timeout_secs: u64,
}

/// Stream behaviour configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub concurrency: ConcurrencyPolicy,
    /// Extra event names, e.g. `message = "chunk"`
    pub event_aliases: BTreeMap<String, String>,
}

/// Credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_file: String,
}

/// Terminal output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub default_verbosity: String,
    pub color_output: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_stream_path: DEFAULT_SESSION_STREAM_PATH.to_string(),
            task_stream_path: DEFAULT_TASK_STREAM_PATH.to_string(),
            history_path: DEFAULT_HISTORY_PATH.to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_file: "~/.chatstream/token".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_verbosity: "normal".to_string(),
            color_output: true,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ChatError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard config location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".chatstream").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ChatError::Config(format!(
                "base_url must start with http:// or https://: {}",
                base_url
            )));
        }

        for (name, path) in [
            ("session_stream_path", &self.api.session_stream_path),
            ("task_stream_path", &self.api.task_stream_path),
            ("history_path", &self.api.history_path),
        ] {
            if !path.starts_with('/') {
                return Err(ChatError::Config(format!("{} must start with '/'", name)));
            }
        }

        if !self.api.history_path.contains("{id}") {
            return Err(ChatError::Config(
                "history_path must contain {id}".to_string(),
            ));
        }

        if self.api.connect_timeout_secs == 0 {
            return Err(ChatError::Config(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        for (event, kind) in &self.stream.event_aliases {
            if EventKind::from_name(kind).is_none() {
                return Err(ChatError::Config(format!(
                    "Unknown event kind '{}' for event '{}'",
                    kind, event
                )));
            }
        }

        match self.telemetry.default_verbosity.as_str() {
            "quiet" | "normal" | "verbose" | "very_verbose" => {}
            _ => {
                return Err(ChatError::Config(format!(
                    "Invalid verbosity level: {}",
                    self.telemetry.default_verbosity
                )))
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ChatError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChatError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ChatError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Stream endpoint layout
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            base_url: self.api.base_url.clone(),
            session_stream_path: self.api.session_stream_path.clone(),
            task_stream_path: self.api.task_stream_path.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout_secs)
    }

    /// Default event mapping plus configured aliases
    pub fn event_map(&self) -> Result<EventMap> {
        self.stream
            .event_aliases
            .iter()
            .try_fold(EventMap::default(), |map, (event, kind)| {
                let kind = EventKind::from_name(kind).ok_or_else(|| {
                    ChatError::Config(format!("Unknown event kind '{}'", kind))
                })?;
                Ok(map.alias(event.clone(), kind))
            })
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Token file path
    pub fn token_file(&self) -> PathBuf {
        Self::expand_path(&self.auth.token_file)
    }
}
