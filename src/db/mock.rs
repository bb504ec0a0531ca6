//! Test doubles for the SQL engine.
//!
//! `MockEngine` records what it was asked to run and returns canned
//! results; `FailingEngine` rejects every statement.

use super::{BindParams, QueryResult, ScalarFunction, SqlEngine};
use crate::error::{RippleError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// A mock engine that returns predefined results.
#[derive(Default)]
pub struct MockEngine {
    results: Vec<QueryResult>,
    executed: Mutex<Vec<String>>,
    functions: Mutex<Vec<String>>,
}

impl MockEngine {
    /// Creates a mock engine that returns no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock engine whose `SELECT` statements return `results`.
    pub fn with_results(results: Vec<QueryResult>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    /// Returns every statement text passed to `execute` or `execute_batch`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }

    /// Returns the names of registered functions, in order.
    pub fn functions(&self) -> Vec<String> {
        self.functions
            .lock()
            .map(|functions| functions.clone())
            .unwrap_or_default()
    }

    fn record(&self, sql: &str) {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }
    }
}

#[async_trait]
impl SqlEngine for MockEngine {
    async fn execute(&self, sql: &str, _params: &BindParams) -> Result<Vec<QueryResult>> {
        self.record(sql);
        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            Ok(self.results.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn execute_batch(&self, script: &str) -> Result<()> {
        self.record(script);
        Ok(())
    }

    async fn register_function(&self, name: &str, _function: ScalarFunction) -> Result<()> {
        if let Ok(mut functions) = self.functions.lock() {
            functions.push(name.to_string());
        }
        Ok(())
    }

    async fn export(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// An engine that fails every statement with the same message.
pub struct FailingEngine {
    message: String,
}

impl FailingEngine {
    /// Creates a failing engine reporting `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl SqlEngine for FailingEngine {
    async fn execute(&self, _sql: &str, _params: &BindParams) -> Result<Vec<QueryResult>> {
        Err(RippleError::engine(self.message.clone()))
    }

    async fn execute_batch(&self, _script: &str) -> Result<()> {
        Err(RippleError::engine(self.message.clone()))
    }

    async fn register_function(&self, _name: &str, _function: ScalarFunction) -> Result<()> {
        Ok(())
    }

    async fn export(&self) -> Result<Vec<u8>> {
        Err(RippleError::engine(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
