//! Configuration System
//!
//! Handles loading configuration from TOML files with serde defaults, so
//! a missing file or empty section falls back to sensible values. The
//! detection section is read once at startup and stays immutable for the
//! process lifetime.

use crate::detect::DetectionConfig;
use crate::storage::EngineConfig;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: EngineConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Env-filter directive, e.g. "pulsedb=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "pulsedb=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.chunk_width_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "storage.chunk_width_secs must be positive, got {}",
                self.storage.chunk_width_secs
            )));
        }
        if self.storage.demote_after_secs < 0 {
            return Err(ConfigError::Invalid(
                "storage.demote_after_secs must not be negative".to_string(),
            ));
        }

        if self.detection.seasonal.min_data_points < 2 {
            return Err(ConfigError::Invalid(
                "detection.seasonal.min_data_points must be at least 2".to_string(),
            ));
        }
        if self.detection.seasonal.period <= 0 {
            return Err(ConfigError::Invalid(
                "detection.seasonal.period must be positive".to_string(),
            ));
        }

        if self.detection.multivariate.align_tolerance_secs < 0 {
            return Err(ConfigError::Invalid(
                "detection.multivariate.align_tolerance_secs must not be negative".to_string(),
            ));
        }

        let window = &self.detection.moving_window;
        if window.window_size <= 0 || window.step_size <= 0 {
            return Err(ConfigError::Invalid(format!(
                "detection.moving_window sizes must be positive, got window_size={} step_size={}",
                window.window_size, window.step_size
            )));
        }

        Ok(())
    }
}
