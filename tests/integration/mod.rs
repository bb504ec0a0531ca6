//! Integration tests for Ripple.

pub mod notify_test;
pub mod pipeline_test;
pub mod schema_test;
