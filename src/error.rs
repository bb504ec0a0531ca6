//! Error types for Ripple.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for Ripple operations.
#[derive(Error, Debug)]
pub enum RippleError {
    /// Execution was requested before an engine was attached to the context.
    #[error("SQL engine not initialized. Call `initialize` before running queries.")]
    NotInitialized,

    /// The engine rejected a statement (syntax errors, missing tables, constraint violations).
    #[error("SQL engine error: {0}")]
    Engine(String),

    /// A schema value could not be compiled or loaded.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The known-table list could not be turned into a matcher.
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Configuration errors (invalid config file, unknown delivery mode, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system errors (schema files, database images).
    #[error("I/O error: {0}")]
    Io(String),
}

impl RippleError {
    /// Creates an engine error with the given message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Creates a schema error with the given message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Creates a classifier error with the given message.
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotInitialized => "Not Initialized",
            Self::Engine(_) => "Engine Error",
            Self::Schema(_) => "Schema Error",
            Self::Classifier(_) => "Classifier Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
        }
    }
}

impl From<rusqlite::Error> for RippleError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Engine(err.to_string())
    }
}

impl From<std::io::Error> for RippleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias using RippleError.
pub type Result<T> = std::result::Result<T, RippleError>;
