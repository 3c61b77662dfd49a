//! Mock catalog for testing
//!
//! Provides an in-memory catalog that can be used for testing orchestration
//! without a live database. Supports:
//! - Pre-configured definitions (given as SQL text)
//! - Per-object fetch errors and panics
//! - Connection failures (always, or for the first N connects)
//! - Simulated latency
//! - Per-object lookup counts and a connect counter
//!
//! # Example
//!
//! ```rust,ignore
//! use ddlcompare_catalog::{MockCatalogBuilder, FetchError};
//! use ddlcompare_core::Dialect;
//!
//! let catalog = MockCatalogBuilder::new("prod", Dialect::Postgres)
//!     .with_sql("CREATE TABLE sales.orders (id INT PRIMARY KEY);")
//!     .with_error("sales.refunds", FetchError::PermissionDenied("no grant".into()))
//!     .with_latency(20)
//!     .build();
//! ```

use crate::source::{CatalogConnector, CatalogSession, FetchError, ObjectLister};
use ddlcompare_core::{Dialect, ObjectName, RawStatement};
use ddlcompare_sql::split_statements;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// In-memory catalog; clones share all state
#[derive(Debug, Clone)]
pub struct MockCatalog {
    label: String,
    dialect: Dialect,
    definitions: Arc<RwLock<HashMap<ObjectName, RawStatement>>>,
    errors: Arc<RwLock<HashMap<ObjectName, FetchError>>>,
    panics: Arc<RwLock<HashSet<ObjectName>>>,
    fail_connection: bool,
    failing_connects: Arc<AtomicUsize>,
    latency_ms: u64,
    lookups: Arc<Mutex<HashMap<ObjectName, usize>>>,
    connects: Arc<AtomicUsize>,
}

impl MockCatalog {
    /// Empty catalog
    pub fn new(label: impl Into<String>, dialect: Dialect) -> Self {
        MockCatalogBuilder::new(label, dialect).build()
    }

    /// Add every CREATE statement in `sql`
    pub async fn add_sql(&self, sql: &str) {
        let mut definitions = self.definitions.write().await;
        for statement in split_statements(self.dialect, &self.label, sql) {
            definitions.insert(statement.name.clone(), statement);
        }
    }

    /// Make fetches of an object fail
    pub async fn add_error(&self, object: &str, error: FetchError) {
        self.errors.write().await.insert(ObjectName::parse(object), error);
    }

    /// Clear all configured errors
    pub async fn clear_errors(&self) {
        self.errors.write().await.clear();
    }

    /// How often an object name was fetched
    pub async fn lookup_count(&self, object: &str) -> usize {
        self.lookups
            .lock()
            .await
            .get(&ObjectName::parse(object))
            .copied()
            .unwrap_or(0)
    }

    /// Fetches across all objects
    pub async fn total_lookups(&self) -> usize {
        self.lookups.lock().await.values().sum()
    }

    /// Number of `connect` calls, failed ones included
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Names of all stored definitions
    pub async fn object_names(&self) -> Vec<ObjectName> {
        let mut names: Vec<_> = self.definitions.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }

    async fn lookup(&self, object: &ObjectName) -> Option<RawStatement> {
        let definitions = self.definitions.read().await;
        if let Some(found) = definitions.get(object) {
            return Some(found.clone());
        }

        let mut candidates: Vec<_> = definitions.values().filter(|s| s.name.matches(object)).collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        candidates.first().map(|s| (*s).clone())
    }
}

#[async_trait::async_trait]
impl CatalogConnector for MockCatalog {
    fn label(&self) -> &str {
        &self.label
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn connect(&self) -> Result<Box<dyn CatalogSession>, FetchError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_connection {
            return Err(FetchError::NetworkError("Simulated connection failure".to_string()));
        }
        let remaining = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(FetchError::NetworkError("Simulated transient connection failure".to_string()));
        }

        Ok(Box::new(self.clone()))
    }
}

#[async_trait::async_trait]
impl CatalogSession for MockCatalog {
    async fn fetch_definition(&self, object: &ObjectName) -> Result<Option<RawStatement>, FetchError> {
        *self.lookups.lock().await.entry(object.clone()).or_insert(0) += 1;
        self.simulate_latency().await;

        if self.panics.read().await.contains(object) {
            panic!("simulated panic while fetching {}", object);
        }
        if let Some(error) = self.errors.read().await.get(object) {
            return Err(error.clone());
        }

        Ok(self.lookup(object).await)
    }

    async fn list_objects(&self, schema: &str) -> Result<BTreeSet<ObjectName>, FetchError> {
        self.list(schema).await
    }
}

#[async_trait::async_trait]
impl ObjectLister for MockCatalog {
    async fn list(&self, schema: &str) -> Result<BTreeSet<ObjectName>, FetchError> {
        self.simulate_latency().await;
        if self.fail_connection {
            return Err(FetchError::NetworkError("Simulated connection failure".to_string()));
        }

        Ok(self
            .definitions
            .read()
            .await
            .keys()
            .filter(|name| name.schema() == Some(schema))
            .map(ObjectName::short)
            .collect())
    }
}

/// Builder for creating MockCatalog with predefined content
pub struct MockCatalogBuilder {
    label: String,
    dialect: Dialect,
    definitions: HashMap<ObjectName, RawStatement>,
    errors: HashMap<ObjectName, FetchError>,
    panics: HashSet<ObjectName>,
    fail_connection: bool,
    failing_connects: usize,
    latency_ms: u64,
}

impl MockCatalogBuilder {
    pub fn new(label: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            label: label.into(),
            dialect,
            definitions: HashMap::new(),
            errors: HashMap::new(),
            panics: HashSet::new(),
            fail_connection: false,
            failing_connects: 0,
            latency_ms: 0,
        }
    }

    /// Add every CREATE statement in `sql`
    pub fn with_sql(mut self, sql: &str) -> Self {
        for statement in split_statements(self.dialect, &self.label, sql) {
            self.definitions.insert(statement.name.clone(), statement);
        }
        self
    }

    /// Add an error for a specific object
    pub fn with_error(mut self, object: &str, error: FetchError) -> Self {
        self.errors.insert(ObjectName::parse(object), error);
        self
    }

    /// Panic when the object is fetched
    pub fn with_panic(mut self, object: &str) -> Self {
        self.panics.insert(ObjectName::parse(object));
        self
    }

    /// Every connect fails
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// The first `count` connects fail, later ones succeed
    pub fn with_failing_connects(mut self, count: usize) -> Self {
        self.failing_connects = count;
        self
    }

    /// Configure latency for every call
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn build(self) -> MockCatalog {
        MockCatalog {
            label: self.label,
            dialect: self.dialect,
            definitions: Arc::new(RwLock::new(self.definitions)),
            errors: Arc::new(RwLock::new(self.errors)),
            panics: Arc::new(RwLock::new(self.panics)),
            fail_connection: self.fail_connection,
            failing_connects: Arc::new(AtomicUsize::new(self.failing_connects)),
            latency_ms: self.latency_ms,
            lookups: Arc::new(Mutex::new(HashMap::new())),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }
}
