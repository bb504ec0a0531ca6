//! Configuration management for Ripple.
//!
//! Handles loading configuration from a TOML file and environment
//! variables: where the schema and prior database image live, how write
//! notifications are delivered, and where logs go.

use crate::error::{Result, RippleError};
use crate::logging::default_log_path;
use crate::notify::Delivery;
use crate::schema::SchemaSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Ripple.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Schema and image locations.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Notification delivery settings.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the database comes from.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DatabaseConfig {
    /// Schema file, JSON or TOML by extension.
    pub schema: Option<PathBuf>,

    /// Prior database image. When present the schema is applied cautiously.
    pub data: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Overrides fields that are set in `other`.
    pub fn merge(&mut self, other: &DatabaseConfig) {
        if other.schema.is_some() {
            self.schema = other.schema.clone();
        }
        if other.data.is_some() {
            self.data = other.data.clone();
        }
    }

    /// Fills unset fields from `RIPPLE_SCHEMA` and `RIPPLE_DATA`.
    pub fn apply_env_defaults(&mut self) {
        if self.schema.is_none() {
            self.schema = std::env::var_os("RIPPLE_SCHEMA").map(PathBuf::from);
        }
        if self.data.is_none() {
            self.data = std::env::var_os("RIPPLE_DATA").map(PathBuf::from);
        }
    }

    /// Loads the schema and image files.
    pub fn load_source(&self) -> Result<SchemaSource> {
        SchemaSource::load(self.schema.as_deref(), self.data.as_deref())
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NotifyConfig {
    /// "detached" (default) or "inline".
    #[serde(default)]
    pub delivery: Delivery,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Log to this file instead of stderr. `"default"` picks the
    /// platform state directory, see [`default_log_path`].
    pub file: Option<PathBuf>,
}

/// Value of `[logging] file` that selects [`default_log_path`].
pub const DEFAULT_LOG_FILE: &str = "default";

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Returns the log file to write to, if any.
    pub fn resolved_file(&self) -> Option<PathBuf> {
        self.file.as_ref().map(|file| {
            if file.as_os_str() == DEFAULT_LOG_FILE {
                default_log_path()
            } else {
                file.clone()
            }
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

impl Config {
    /// Returns the default configuration file path.
    ///
    /// On Linux this is `~/.config/db-ripple/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-ripple")
            .join("config.toml")
    }

    /// Loads configuration from the specified file path.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RippleError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Loads configuration from `path`, or from the default path when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_from_file(&Self::default_path()),
        }
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            RippleError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}
