//! Per-table change notification.
//!
//! The registry maps table names to listeners that want to hear about
//! writes to that table. It only ever holds weak references: a listener
//! lives exactly as long as its owner keeps the `Arc` alive.

mod clock;
mod registry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use registry::{FanOutReport, ListenerRegistry, Notification};

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// A callback invoked with the write timestamp (milliseconds since the epoch).
pub type Listener = Arc<dyn Fn(i64) + Send + Sync>;

/// How a trigger delivers to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Fan-out runs on a worker and is never awaited by the writer.
    #[default]
    Detached,
    /// Fan-out runs on the caller before the write pipeline returns.
    Inline,
}

impl Delivery {
    /// Parses a delivery mode from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "detached" => Some(Self::Detached),
            "inline" => Some(Self::Inline),
            _ => None,
        }
    }
}

/// Accepts the same spellings as [`Delivery::parse`], in any case.
impl<'de> Deserialize<'de> for Delivery {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mode = String::deserialize(deserializer)?;
        Self::parse(&mode).ok_or_else(|| {
            de::Error::custom(format!(
                "unknown delivery mode '{mode}', expected detached or inline"
            ))
        })
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => write!(f, "detached"),
            Self::Inline => write!(f, "inline"),
        }
    }
}

/// Wraps a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(i64) + Send + Sync + 'static,
{
    Arc::new(f)
}
