//! SQLite engine implementation.
//!
//! Provides the `SqliteEngine` struct that implements the `SqlEngine` trait
//! on top of an embedded, bundled SQLite via rusqlite.

use crate::db::{BindParams, QueryResult, Row, ScalarFunction, SqlEngine, Value};
use crate::error::{RippleError, Result};
use async_trait::async_trait;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, Statement};
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Embedded SQLite engine.
///
/// The connection sits behind a mutex so the engine can be shared across
/// tasks; statements still run one at a time. Every statement runs on the
/// tokio blocking pool, so engine calls need a tokio runtime.
#[derive(Debug)]
pub struct SqliteEngine {
    conn: Arc<Mutex<Option<Connection>>>,
    /// Backing file when the engine was opened from an image.
    image: Option<NamedTempFile>,
}

impl SqliteEngine {
    /// Opens an empty in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("Opened in-memory SQLite database");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            image: None,
        })
    }

    /// Opens a database from a previously exported image.
    ///
    /// The bytes are copied to a private temporary file that lives as long
    /// as the engine; the caller's buffer is not modified.
    pub fn open_image(bytes: &[u8]) -> Result<Self> {
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;

        let conn = Connection::open(file.path())?;
        // Fails early on bytes that are not a SQLite database.
        let tables: i64 = conn
            .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
            .map_err(|e| RippleError::engine(format!("Invalid database image: {e}")))?;

        info!("Opened database image ({} bytes, {} objects)", bytes.len(), tables);
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            image: Some(file),
        })
    }

    /// Returns true if the engine was opened from an image.
    pub fn is_from_image(&self) -> bool {
        self.image.is_some()
    }

    /// Runs `f` against the open connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| RippleError::engine("SQLite engine is closed"))?;
            f(conn)
        })
        .await
        .map_err(|e| RippleError::engine(format!("spawn_blocking join error: {e}")))?
    }
}

fn lock(conn: &Mutex<Option<Connection>>) -> Result<MutexGuard<'_, Option<Connection>>> {
    conn.lock()
        .map_err(|_| RippleError::engine("SQLite connection lock poisoned"))
}

#[async_trait]
impl SqlEngine for SqliteEngine {
    async fn execute(&self, sql: &str, params: &BindParams) -> Result<Vec<QueryResult>> {
        let start = Instant::now();
        let sql = sql.to_string();
        let params = params.clone();
        let results = self
            .with_conn(move |conn| run_statements(conn, &sql, &params))
            .await?;
        debug!(
            "Executed query in {:?} ({} result sets)",
            start.elapsed(),
            results.len()
        );
        Ok(results)
    }

    async fn execute_batch(&self, script: &str) -> Result<()> {
        let script = script.to_string();
        self.with_conn(move |conn| Ok(conn.execute_batch(&script)?))
            .await
    }

    async fn register_function(&self, name: &str, function: ScalarFunction) -> Result<()> {
        let function = AssertUnwindSafe(function);
        let fn_name = name.to_string();
        self.with_conn(move |conn| {
            conn.create_scalar_function(
                fn_name.as_str(),
                -1,
                FunctionFlags::SQLITE_UTF8,
                move |ctx| call_function(&function, ctx),
            )?;
            Ok(())
        })
        .await?;
        debug!("Registered SQL function '{}'", name);
        Ok(())
    }

    async fn export(&self) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("export.db");

        let bytes = self
            .with_conn(move |conn| {
                let literal = target.display().to_string().replace('\'', "''");
                conn.execute_batch(&format!("VACUUM INTO '{literal}'"))?;
                std::fs::read(&target).map_err(|e| {
                    RippleError::io(format!(
                        "Failed to read exported image {}: {e}",
                        target.display()
                    ))
                })
            })
            .await?;
        debug!("Exported database image ({} bytes)", bytes.len());
        Ok(bytes)
    }

    async fn close(&self) -> Result<()> {
        let conn = lock(&self.conn)?.take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| RippleError::from(e))?;
        }
        Ok(())
    }
}

/// Runs every statement in `sql`, collecting the ones that produced rows.
fn run_statements(conn: &Connection, sql: &str, params: &BindParams) -> Result<Vec<QueryResult>> {
    let mut results = Vec::new();
    let mut batch = Batch::new(conn, sql);

    while let Some(mut stmt) = batch.next()? {
        bind_params(&mut stmt, params)?;

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows: Vec<Row> = Vec::new();
        let mut cursor = stmt.raw_query();
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(Value::from(row.get_ref(index)?));
            }
            rows.push(values);
        }

        if !rows.is_empty() {
            results.push(QueryResult::with_data(columns, rows));
        }
    }

    Ok(results)
}

/// Binds the parameters a statement actually uses; the rest are ignored.
fn bind_params(stmt: &mut Statement<'_>, params: &BindParams) -> Result<()> {
    match params {
        BindParams::None => {}
        BindParams::Positional(values) => {
            for (offset, value) in values.iter().take(stmt.parameter_count()).enumerate() {
                stmt.raw_bind_parameter(offset + 1, to_sql_value(value))?;
            }
        }
        BindParams::Named(pairs) => {
            for (name, value) in pairs {
                if let Some(index) = stmt.parameter_index(name)? {
                    stmt.raw_bind_parameter(index, to_sql_value(value))?;
                }
            }
        }
    }
    Ok(())
}

fn call_function(
    function: &AssertUnwindSafe<ScalarFunction>,
    ctx: &Context<'_>,
) -> rusqlite::Result<rusqlite::types::Value> {
    let args: Vec<Value> = (0..ctx.len()).map(|i| Value::from(ctx.get_raw(i))).collect();
    (function.0)(&args)
        .map(|value| to_sql_value(&value))
        .map_err(|msg| rusqlite::Error::UserFunctionError(msg.into()))
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Real(f) => rusqlite::types::Value::Real(*f),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => match std::str::from_utf8(t) {
                Ok(text) => Value::Text(text.to_string()),
                // Keep the raw bytes rather than substituting replacement characters.
                Err(_) => Value::Blob(t.to_vec()),
            },
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}
