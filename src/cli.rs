//! Command-line argument parsing for Ripple.

use crate::config::{Config, DatabaseConfig};
use crate::error::{Result, RippleError};
use crate::notify::Delivery;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reactive SQL: classify queries, compile schemas, and watch tables for writes.
#[derive(Parser, Debug)]
#[command(name = "ripple")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Schema file (JSON, or TOML by extension)
    #[arg(short = 's', long, value_name = "PATH", global = true)]
    pub schema: Option<PathBuf>,

    /// Prior database image; applies the schema with IF NOT EXISTS
    #[arg(short = 'd', long, value_name = "PATH", global = true)]
    pub data: Option<PathBuf>,

    /// Notification delivery: detached or inline
    #[arg(long, value_name = "MODE", global = true)]
    pub delivery: Option<String>,

    /// Write logs to this file instead of stderr ("default" for the state directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Ripple subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the SQL script compiled from the schema
    Compile,

    /// Classify a statement against the schema's tables
    Classify {
        /// SQL text
        sql: String,
    },

    /// Print the fingerprint of a text
    Fingerprint {
        /// Text to hash
        text: String,
    },

    /// Run statements through the read pipeline and print results as JSON
    Exec {
        /// One or more SQL statements, run in order
        #[arg(required = true)]
        sql: Vec<String>,
    },

    /// Write the initialized database image to a file
    Export {
        /// Output path
        out: PathBuf,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Converts the database flags to a partial config for merging.
    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            schema: self.schema.clone(),
            data: self.data.clone(),
        }
    }

    /// Parses the --delivery flag, if given.
    pub fn delivery(&self) -> Result<Option<Delivery>> {
        self.delivery
            .as_deref()
            .map(|mode| {
                Delivery::parse(mode).ok_or_else(|| {
                    RippleError::config(format!(
                        "Invalid delivery mode: {mode}. Expected: detached or inline"
                    ))
                })
            })
            .transpose()
    }

    /// Applies CLI overrides on top of a loaded config.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        config.database.merge(&self.to_database_config());
        if let Some(delivery) = self.delivery()? {
            config.notify.delivery = delivery;
        }
        if self.log_file.is_some() {
            config.logging.file = self.log_file.clone();
        }
        Ok(())
    }
}
