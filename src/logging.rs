//! Logging configuration for Ripple.
//!
//! Logs go to stderr by default, or to a file when one is configured so
//! that JSON written to stdout stays clean.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Initializes logging to stderr.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_stderr_logging(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes logging to `path`, truncating it.
///
/// Falls back to stderr if the file cannot be created.
pub fn init_file_logging(path: &Path, default_filter: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging(default_filter);
            return;
        }
    }

    let log_file = match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            init_stderr_logging(default_filter);
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Returns the default log file path.
///
/// Uses XDG state directory on Linux (`~/.local/state/db-ripple/ripple.log`),
/// or falls back to config directory on other platforms.
pub fn default_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("db-ripple").join("ripple.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("db-ripple").join("ripple.log");
    }

    std::env::temp_dir().join("ripple.log")
}
