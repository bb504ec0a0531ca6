//! The reactive database context.
//!
//! `ReactiveDb` owns one engine, the known-table classifier and the listener
//! registry, and exposes the read and write pipelines that tie them
//! together. Every pipeline failure ends here: callers get `None` and the
//! reason goes to the log.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use crate::classify::TableClassifier;
use crate::db::{BindParams, QueryResult, ScalarFunction, SqlEngine, SqliteEngine};
use crate::error::{Result, RippleError};
use crate::notify::{Clock, Delivery, Listener, ListenerRegistry, Notification, SystemClock};
use crate::schema::SchemaSource;

/// Construction options for [`ReactiveDb`].
#[derive(Clone)]
pub struct ReactiveOptions {
    /// How write notifications reach listeners.
    pub delivery: Delivery,
    /// Source of the timestamp passed to listeners.
    pub clock: Arc<dyn Clock>,
}

impl Default for ReactiveOptions {
    fn default() -> Self {
        Self {
            delivery: Delivery::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl ReactiveOptions {
    /// Sets the delivery mode.
    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Sets the clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

/// What a pipeline call produced.
#[derive(Debug)]
pub struct Outcome {
    /// Result sets returned by the engine.
    pub results: Vec<QueryResult>,
    /// Set when the statement was a write to a table with listeners.
    pub notification: Option<Notification>,
}

/// One logical database plus its notification bus.
pub struct ReactiveDb {
    engine: RwLock<Option<Arc<dyn SqlEngine>>>,
    classifier: RwLock<TableClassifier>,
    registry: Arc<ListenerRegistry>,
    options: ReactiveOptions,
}

impl Default for ReactiveDb {
    fn default() -> Self {
        Self::new(ReactiveOptions::default())
    }
}

impl ReactiveDb {
    /// Creates a context with no engine and an empty registry.
    pub fn new(options: ReactiveOptions) -> Self {
        Self {
            engine: RwLock::new(None),
            classifier: RwLock::new(TableClassifier::default()),
            registry: Arc::new(ListenerRegistry::new()),
            options,
        }
    }

    /// Opens an engine for `source`, installs `functions`, and applies the schema.
    ///
    /// A non-empty image in `source` is opened as the starting database and
    /// the schema is compiled in cautious mode. Any previous engine is
    /// closed; the registry is kept.
    pub async fn initialize(
        &self,
        source: SchemaSource,
        functions: Vec<(String, ScalarFunction)>,
    ) -> Result<()> {
        let engine = match source.data.as_deref() {
            Some(bytes) if !bytes.is_empty() => SqliteEngine::open_image(bytes)?,
            _ => SqliteEngine::open_in_memory()?,
        };
        let engine: Arc<dyn SqlEngine> = Arc::new(engine);

        for (name, function) in functions {
            engine.register_function(&name, function).await?;
        }

        let compiled = source.compile()?;
        info!(
            "Applying {:?} schema for {} tables",
            source.mode(),
            compiled.tables.len()
        );
        if !compiled.script.is_empty() {
            engine.execute_batch(&compiled.script).await?;
        }

        self.attach(engine, compiled.tables.as_slice()).await
    }

    /// Installs an externally constructed engine with its known tables.
    pub async fn attach<S: AsRef<str>>(&self, engine: Arc<dyn SqlEngine>, tables: &[S]) -> Result<()> {
        let classifier = TableClassifier::new(tables)?;

        let previous = self
            .engine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(engine);
        *self.classifier.write().unwrap_or_else(PoisonError::into_inner) = classifier;

        if let Some(previous) = previous {
            if let Err(e) = previous.close().await {
                warn!("Failed to close previous engine: {e}");
            }
        }

        info!("Database ready with tables {:?}", self.tables());
        Ok(())
    }

    /// Closes and drops the engine. Registered listeners stay registered.
    pub async fn destroy(&self) -> Result<()> {
        let engine = self
            .engine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match engine {
            Some(engine) => {
                engine.close().await?;
                info!("Database destroyed");
                Ok(())
            }
            None => Err(RippleError::NotInitialized),
        }
    }

    /// Serializes the current database into an image.
    pub async fn export(&self) -> Result<Vec<u8>> {
        self.engine()?.export().await
    }

    /// Returns true if an engine is attached.
    pub fn is_initialized(&self) -> bool {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the known-table list.
    pub fn tables(&self) -> Vec<String> {
        self.classifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tables()
            .to_vec()
    }

    /// Returns the listener registry.
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Returns the configured delivery mode.
    pub fn delivery(&self) -> Delivery {
        self.options.delivery
    }

    /// Runs `sql` on the engine without classification.
    pub async fn execute(&self, sql: &str, params: &BindParams) -> Result<Vec<QueryResult>> {
        self.engine()?.execute(sql, params).await
    }

    /// Runs `sql` on the engine, logging any failure and returning `None`.
    pub async fn execute_query(&self, sql: &str, params: &BindParams) -> Option<Vec<QueryResult>> {
        match self.execute(sql, params).await {
            Ok(results) => Some(results),
            Err(RippleError::NotInitialized) => {
                error!("SQL engine not initialized, dropping query: {sql}");
                None
            }
            Err(e) => {
                error!("Query failed: {e}");
                None
            }
        }
    }

    /// Read pipeline.
    ///
    /// Registers `listener` for every known table the query reads from,
    /// executes it, and, if the same text is also an insert into a known
    /// table, notifies that table's listeners.
    pub async fn query(&self, listener: &Listener, sql: &str, params: &BindParams) -> Option<Outcome> {
        let (reads, write) = {
            let classifier = self.classifier.read().unwrap_or_else(PoisonError::into_inner);
            (classifier.classify_read(sql), classifier.classify_write(sql))
        };

        for table in reads.iter().flatten() {
            self.registry.register(table, listener);
        }

        let results = self.execute_query(sql, params).await?;
        let notification = write.and_then(|table| self.notify(&table));
        Some(Outcome {
            results,
            notification,
        })
    }

    /// Write pipeline.
    ///
    /// Text that is not an insert into a known table is not executed at
    /// all. On success the target table's listeners are notified.
    pub async fn insert(&self, sql: &str, params: &BindParams) -> Option<Outcome> {
        let table = self
            .classifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .classify_write(sql);

        let Some(table) = table else {
            debug!("Not an insert into a known table, skipping: {sql}");
            return None;
        };

        let results = self.execute_query(sql, params).await?;
        let notification = self.notify(&table);
        Some(Outcome {
            results,
            notification,
        })
    }

    fn notify(&self, table: &str) -> Option<Notification> {
        let timestamp = self.options.clock.now_millis();
        self.registry
            .trigger(table, timestamp, self.options.delivery)
    }

    fn engine(&self) -> Result<Arc<dyn SqlEngine>> {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(RippleError::NotInitialized)
    }
}
