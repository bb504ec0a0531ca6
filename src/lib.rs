//! Ripple - a reactive layer over an embedded SQL engine.
//!
//! Classifies SQL text as read or write, compiles declarative schemas into
//! SQL, and notifies per-table listeners when a table is written.

pub mod classify;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod schema;

pub use classify::{Classification, TableClassifier};
pub use error::{Result, RippleError};
pub use fingerprint::fingerprint;
pub use notify::{listener, Delivery, Listener, ListenerRegistry};
pub use pipeline::{Outcome, ReactiveDb, ReactiveOptions};
pub use schema::{Schema, SchemaSource, TableSchema};
