//! Configuration for the Branchtalk engine.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum conversation tree sessions kept in the LRU cache
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Content of the root system message for new conversations
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    /// Characters of message content shown per line in tree outlines
    #[serde(default = "default_preview_width")]
    pub preview_width: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_sessions() -> usize {
    16
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant. Engage in natural conversation and provide useful responses."
        .to_string()
}

fn default_preview_width() -> usize {
    48
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            default_system_prompt: default_system_prompt(),
            preview_width: default_preview_width(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("branchtalk")
            .join("config.yaml")
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        let config_path = Self::default_path();

        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid {
                field: "max_sessions",
                message: "must be at least 1".to_string(),
            });
        }
        if self.preview_width < 4 {
            return Err(ConfigError::Invalid {
                field: "preview_width",
                message: "must be at least 4".to_string(),
            });
        }
        Ok(())
    }
}
