//! Source traits and fetch errors

use ddlcompare_core::{Dialect, ObjectName, RawStatement};
use std::collections::BTreeSet;

/// Errors raised while talking to a definition source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

impl FetchError {
    /// Errors worth one retry with a fresh session
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::NetworkError(_))
    }
}

/// Opens sessions against one source
///
/// Implementations must be cheap to share between workers; every worker
/// calls [`CatalogConnector::connect`] for its own session.
#[async_trait::async_trait]
pub trait CatalogConnector: Send + Sync {
    /// Source label used in reports
    fn label(&self) -> &str;

    /// Dialect of the definitions this source returns
    fn dialect(&self) -> Dialect;

    /// Open a new session
    async fn connect(&self) -> Result<Box<dyn CatalogSession>, FetchError>;
}

/// One open connection to a source
#[async_trait::async_trait]
pub trait CatalogSession: Send + Sync {
    /// Fetch the CREATE statement for an object
    ///
    /// `Ok(None)` means the source answered and the object does not exist.
    async fn fetch_definition(&self, object: &ObjectName) -> Result<Option<RawStatement>, FetchError>;

    /// Tables and views in a schema
    async fn list_objects(&self, schema: &str) -> Result<BTreeSet<ObjectName>, FetchError>;
}

/// Auto-discovery of the objects in a schema
#[async_trait::async_trait]
pub trait ObjectLister: Send + Sync {
    async fn list(&self, schema: &str) -> Result<BTreeSet<ObjectName>, FetchError>;
}
