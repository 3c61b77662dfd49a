//! Catalog backed by SQL text
//!
//! Statements are split out of one or more SQL files once, up front. When
//! an object is defined more than once the last definition wins.

use crate::source::{CatalogConnector, CatalogSession, FetchError, ObjectLister};
use ddlcompare_core::{Dialect, ObjectName, RawStatement};
use ddlcompare_sql::split_statements;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct TextInner {
    label: String,
    dialect: Dialect,
    statements: Vec<RawStatement>,
}

/// In-memory catalog of statements split from SQL text
#[derive(Debug, Clone)]
pub struct TextCatalog {
    inner: Arc<TextInner>,
}

impl TextCatalog {
    /// Catalog over already-split statements
    pub fn from_statements(label: impl Into<String>, dialect: Dialect, statements: Vec<RawStatement>) -> Self {
        Self {
            inner: Arc::new(TextInner {
                label: label.into(),
                dialect,
                statements,
            }),
        }
    }

    /// Split a text blob
    pub fn from_text(label: impl Into<String>, dialect: Dialect, text: &str) -> Self {
        let label = label.into();
        let statements = split_statements(dialect, &label, text);
        Self::from_statements(label, dialect, statements)
    }

    /// Read and split SQL files, in order
    pub fn from_files(label: impl Into<String>, dialect: Dialect, paths: &[PathBuf]) -> Result<Self, FetchError> {
        let label = label.into();
        let mut statements = Vec::new();

        for path in paths {
            let text = std::fs::read_to_string(path).map_err(|e| {
                FetchError::ConfigError(format!("cannot read {}: {}", path.display(), e))
            })?;
            let source = path.display().to_string();
            statements.extend(split_statements(dialect, &source, &text));
        }

        debug!(source = %label, files = paths.len(), statements = statements.len(), "loaded SQL text");
        Ok(Self::from_statements(label, dialect, statements))
    }

    pub fn len(&self) -> usize {
        self.inner.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.statements.is_empty()
    }

    /// All statements in file order
    pub fn statements(&self) -> &[RawStatement] {
        &self.inner.statements
    }

    /// Definition of an object: exact name first, then a suffix match
    ///
    /// `orders` finds `sales.orders`, `db.sales.orders` finds `sales.orders`.
    pub fn lookup(&self, object: &ObjectName) -> Option<&RawStatement> {
        let statements = &self.inner.statements;
        statements
            .iter()
            .rev()
            .find(|s| &s.name == object)
            .or_else(|| statements.iter().rev().find(|s| s.name.matches(object)))
    }

    /// Short names of the objects defined in a schema
    pub fn objects_in(&self, schema: &str) -> BTreeSet<ObjectName> {
        self.inner
            .statements
            .iter()
            .filter(|s| s.name.schema() == Some(schema))
            .map(|s| s.name.short())
            .collect()
    }
}

#[async_trait::async_trait]
impl CatalogConnector for TextCatalog {
    fn label(&self) -> &str {
        &self.inner.label
    }

    fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    async fn connect(&self) -> Result<Box<dyn CatalogSession>, FetchError> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait::async_trait]
impl CatalogSession for TextCatalog {
    async fn fetch_definition(&self, object: &ObjectName) -> Result<Option<RawStatement>, FetchError> {
        Ok(self.lookup(object).cloned())
    }

    async fn list_objects(&self, schema: &str) -> Result<BTreeSet<ObjectName>, FetchError> {
        Ok(self.objects_in(schema))
    }
}

#[async_trait::async_trait]
impl ObjectLister for TextCatalog {
    async fn list(&self, schema: &str) -> Result<BTreeSet<ObjectName>, FetchError> {
        Ok(self.objects_in(schema))
    }
}
