//! Table to listener registry and trigger fan-out.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{Delivery, Listener};

type WeakListener = Weak<dyn Fn(i64) + Send + Sync>;

/// What one trigger did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Listeners that ran to completion.
    pub invoked: usize,
    /// Entries whose owner was gone.
    pub skipped: usize,
    /// Listeners that panicked.
    pub failed: usize,
}

/// A trigger that was either scheduled or already delivered.
#[derive(Debug)]
pub enum Notification {
    /// Running on the blocking pool.
    Scheduled(JoinHandle<FanOutReport>),
    /// Ran on the caller.
    Delivered(FanOutReport),
}

impl Notification {
    /// Waits for delivery to finish. Writers never need to call this.
    pub async fn wait(self) -> FanOutReport {
        match self {
            Self::Delivered(report) => report,
            Self::Scheduled(handle) => handle.await.unwrap_or_else(|e| {
                error!("Notification task did not complete: {e}");
                FanOutReport::default()
            }),
        }
    }
}

/// Maps table names to weakly held listeners, in registration order.
///
/// Dead entries are skipped at trigger time but never removed. The
/// registry is independent of any engine: tearing the database down leaves
/// every list in place.
#[derive(Default)]
pub struct ListenerRegistry {
    tables: Mutex<HashMap<String, Vec<WeakListener>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a weak reference to `listener` for `table`.
    ///
    /// The same listener registered twice is invoked twice.
    pub fn register(&self, table: &str, listener: &Listener) {
        let mut tables = self.lock();
        let entries = tables.entry(table.to_string()).or_default();
        entries.push(std::sync::Arc::downgrade(listener));
        debug!("Registered listener #{} for table '{}'", entries.len(), table);
    }

    /// Notifies every live listener of `table` with `timestamp`.
    ///
    /// Returns `None` if nothing was ever registered for the table. With
    /// [`Delivery::Detached`] the fan-out is handed to the tokio blocking
    /// pool and this returns immediately; outside a runtime it falls back
    /// to running on the caller.
    pub fn trigger(&self, table: &str, timestamp: i64, delivery: Delivery) -> Option<Notification> {
        let entries = self.lock().get(table).cloned()?;
        let table = table.to_string();

        debug!(
            "Triggering {} listener entries for table '{}' ({})",
            entries.len(),
            table,
            delivery
        );

        if delivery == Delivery::Detached {
            match Handle::try_current() {
                Ok(handle) => {
                    let task = handle.spawn_blocking(move || fan_out(&table, &entries, timestamp));
                    return Some(Notification::Scheduled(task));
                }
                Err(_) => warn!("No async runtime available, delivering inline"),
            }
        }

        Some(Notification::Delivered(fan_out(&table, &entries, timestamp)))
    }

    /// Returns the number of entries for `table`, dead ones included.
    pub fn len(&self, table: &str) -> usize {
        self.lock().get(table).map_or(0, Vec::len)
    }

    /// Returns the number of entries for `table` whose owner is still alive.
    pub fn live_len(&self, table: &str) -> usize {
        self.lock()
            .get(table)
            .map_or(0, |entries| entries.iter().filter(|w| w.strong_count() > 0).count())
    }

    /// Returns the tables that have ever had a listener, sorted.
    pub fn tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.lock().keys().cloned().collect();
        tables.sort();
        tables
    }

    /// Returns true if no table has a listener list.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<WeakListener>>> {
        // Listeners never run under this lock, so a poisoned map is still consistent.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Invokes each live listener in order, isolating panics.
fn fan_out(table: &str, entries: &[WeakListener], timestamp: i64) -> FanOutReport {
    let mut report = FanOutReport::default();

    for entry in entries {
        let Some(listener) = entry.upgrade() else {
            report.skipped += 1;
            continue;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| listener(timestamp))) {
            Ok(()) => report.invoked += 1,
            Err(payload) => {
                report.failed += 1;
                error!(
                    "Listener for table '{}' panicked: {}",
                    table,
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    debug!(
        "Fan-out for '{}' done: {} invoked, {} skipped, {} failed",
        table, report.invoked, report.skipped, report.failed
    );
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
