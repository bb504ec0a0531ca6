//! SQL engine abstraction for Ripple.
//!
//! The reactive layer never talks to SQLite directly: it goes through the
//! `SqlEngine` trait, so the bundled rusqlite adapter, the test doubles, or
//! a caller-supplied engine can be used interchangeably.

mod mock;
mod sqlite;
mod types;

pub use mock::{FailingEngine, MockEngine};
pub use sqlite::SqliteEngine;
pub use types::{BindParams, QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A scalar SQL function implemented in Rust.
///
/// Receives the call's arguments and returns a value, or an error message
/// that the engine reports as a statement failure.
pub type ScalarFunction =
    Arc<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

/// Trait defining the interface for SQL engines.
///
/// All operations are async and return Results with RippleError.
#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Executes one or more statements.
    ///
    /// Returns one result set per statement that produced at least one row,
    /// so a lone `INSERT` yields an empty sequence.
    async fn execute(&self, sql: &str, params: &BindParams) -> Result<Vec<QueryResult>>;

    /// Executes a script for its side effects only.
    async fn execute_batch(&self, script: &str) -> Result<()>;

    /// Installs a scalar function under `name`, callable from any later statement.
    async fn register_function(&self, name: &str, function: ScalarFunction) -> Result<()>;

    /// Serializes the database into an image that can seed a later engine.
    async fn export(&self) -> Result<Vec<u8>>;

    /// Closes the engine. Later calls fail.
    async fn close(&self) -> Result<()>;
}
