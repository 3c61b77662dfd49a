//! Per-object pipeline
//!
//! Fetch, parse and compare (or resolve) one worklist item. Every error
//! ends up in the returned [`Outcome`]; nothing escapes to the caller.

use crate::comparator::Comparator;
use crate::dependency::{DependencyFailure, DependencyResolver};
use crate::worklist::WorkItem;
use ddlcompare_catalog::{CatalogConnector, CatalogSession, FetchError};
use ddlcompare_core::{
    ComparisonResult, ExtractedDefinition, ObjectKind, ObjectName, OverallStatus, PairComparison, RawStatement,
    RunMode, SchemaObject,
};
use ddlcompare_sql::{ParseError, SqlParser};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tagged result of one pipeline run
#[derive(Debug, Clone)]
pub enum Outcome {
    Compared(ComparisonResult),
    Extracted(ExtractedDefinition),
    Failed {
        object: ObjectName,
        kind: Option<ObjectKind>,
        message: String,
    },
}

impl Outcome {
    pub fn failed(object: ObjectName, message: impl Into<String>) -> Self {
        Self::Failed {
            object,
            kind: None,
            message: message.into(),
        }
    }

    pub fn object(&self) -> &ObjectName {
        match self {
            Self::Compared(result) => &result.object,
            Self::Extracted(definition) => &definition.object,
            Self::Failed { object, .. } => object,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Why a pipeline run failed
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{label}: {error}")]
    Fetch { label: String, error: FetchError },

    #[error("{label}: {error}")]
    Parse { label: String, error: ParseError },
}

/// Sessions owned by one worker
///
/// A slot is emptied whenever its session errors and refilled on the next
/// fetch.
#[derive(Default)]
pub struct Sessions {
    source: Option<Box<dyn CatalogSession>>,
    targets: Vec<Option<Box<dyn CatalogSession>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open sessions
    pub fn open(&self) -> usize {
        self.source.iter().count() + self.targets.iter().flatten().count()
    }
}

/// Fetch limits for a pipeline
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub retry_connection: bool,
    pub backoff: Duration,
}

/// Everything needed to process an item, shared by all workers
pub struct Pipeline {
    mode: RunMode,
    source: Arc<dyn CatalogConnector>,
    targets: Vec<Arc<dyn CatalogConnector>>,
    comparator: Comparator,
    policy: FetchPolicy,
    dependency_depth: usize,
}

impl Pipeline {
    pub fn new(
        mode: RunMode,
        source: Arc<dyn CatalogConnector>,
        targets: Vec<Arc<dyn CatalogConnector>>,
        comparator: Comparator,
        policy: FetchPolicy,
        dependency_depth: usize,
    ) -> Self {
        Self {
            mode,
            source,
            targets,
            comparator,
            policy,
            dependency_depth,
        }
    }

    /// Run one item end to end
    pub async fn run(&self, item: &WorkItem, sessions: &mut Sessions) -> Outcome {
        debug!(object = %item.object, "Processing object");

        let result = match self.mode {
            RunMode::Compare => self.compare(item, sessions).await,
            RunMode::Extract => self.extract(item, sessions).await,
        };

        result.unwrap_or_else(|e| {
            warn!(object = %item.object, "Object failed: {}", e);
            Outcome::failed(item.object.clone(), e.to_string())
        })
    }

    async fn compare(&self, item: &WorkItem, sessions: &mut Sessions) -> Result<Outcome, PipelineError> {
        let source = self
            .fetch_object(self.source.as_ref(), &mut sessions.source, &item.object)
            .await?;

        sessions.targets.resize_with(self.targets.len(), || None);
        let mut targets = Vec::with_capacity(self.targets.len());
        for (connector, slot) in self.targets.iter().zip(sessions.targets.iter_mut()) {
            let name = item.target_name(connector.label());
            let object = self.fetch_object(connector.as_ref(), slot, name).await?;
            targets.push((connector.label(), object));
        }

        let targets: Vec<(&str, Option<&SchemaObject>)> =
            targets.iter().map(|(label, object)| (*label, object.as_ref())).collect();
        Ok(Outcome::Compared(
            self.comparator.compare(&item.object, source.as_ref(), &targets),
        ))
    }

    async fn extract(&self, item: &WorkItem, sessions: &mut Sessions) -> Result<Outcome, PipelineError> {
        let connector = self.source.as_ref();
        let fetch_error = |error: FetchError| PipelineError::Fetch {
            label: connector.label().to_string(),
            error,
        };

        let Some(root) = self
            .fetch(connector, &mut sessions.source, &item.object)
            .await
            .map_err(fetch_error)?
        else {
            return Ok(Outcome::Compared(ComparisonResult::from_pairs(
                item.object.clone(),
                ObjectKind::Table,
                vec![PairComparison::unavailable(
                    connector.label(),
                    OverallStatus::NotAvailableInSource,
                )],
            )));
        };

        SqlParser::new(connector.dialect())
            .parse_statement(&root)
            .map_err(|error| PipelineError::Parse {
                label: connector.label().to_string(),
                error,
            })?;

        let session = self
            .session(connector, &mut sessions.source)
            .await
            .map_err(fetch_error)?;
        let resolution = DependencyResolver::new(connector.dialect(), self.dependency_depth, self.policy.timeout)
            .resolve(session, &root)
            .await;

        let lost_connection = resolution
            .failures
            .iter()
            .any(|f| matches!(f, DependencyFailure::Lookup { error, .. } if error.is_connection()));
        if lost_connection {
            sessions.source = None;
        }

        let unresolved = resolution.unresolved();
        Ok(Outcome::Extracted(ExtractedDefinition {
            object: item.object.clone(),
            kind: root.kind,
            ddl: root.text,
            dependencies: resolution.resolved,
            dependency_definitions: resolution.definitions,
            unresolved,
        }))
    }

    /// Fetch and parse; `None` when the source does not have the object
    async fn fetch_object(
        &self,
        connector: &dyn CatalogConnector,
        slot: &mut Option<Box<dyn CatalogSession>>,
        name: &ObjectName,
    ) -> Result<Option<SchemaObject>, PipelineError> {
        let statement = self
            .fetch(connector, slot, name)
            .await
            .map_err(|error| PipelineError::Fetch {
                label: connector.label().to_string(),
                error,
            })?;

        statement
            .map(|s| SqlParser::new(connector.dialect()).parse_statement(&s))
            .transpose()
            .map_err(|error| PipelineError::Parse {
                label: connector.label().to_string(),
                error,
            })
    }

    /// Fetch with one reconnect-and-retry on connection errors
    async fn fetch(
        &self,
        connector: &dyn CatalogConnector,
        slot: &mut Option<Box<dyn CatalogSession>>,
        name: &ObjectName,
    ) -> Result<Option<RawStatement>, FetchError> {
        let mut retried = false;
        loop {
            match self.try_fetch(connector, slot, name).await {
                Ok(statement) => return Ok(statement),
                Err(e) if e.is_connection() && self.policy.retry_connection && !retried => {
                    *slot = None;
                    retried = true;
                    warn!(
                        source = connector.label(),
                        object = %name,
                        "Connection error, retrying in {} ms: {}",
                        self.policy.backoff.as_millis(),
                        e
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(e) => {
                    *slot = None;
                    return Err(e);
                }
            }
        }
    }

    async fn try_fetch(
        &self,
        connector: &dyn CatalogConnector,
        slot: &mut Option<Box<dyn CatalogSession>>,
        name: &ObjectName,
    ) -> Result<Option<RawStatement>, FetchError> {
        let session = self.session(connector, slot).await?;
        self.with_timeout(session.fetch_definition(name)).await
    }

    /// The slot's session, connecting first if it is empty
    async fn session<'a>(
        &self,
        connector: &dyn CatalogConnector,
        slot: &'a mut Option<Box<dyn CatalogSession>>,
    ) -> Result<&'a dyn CatalogSession, FetchError> {
        let session = match slot.take() {
            Some(session) => session,
            None => {
                debug!(source = connector.label(), "Opening session");
                self.with_timeout(connector.connect()).await?
            }
        };
        Ok(&**slot.insert(session))
    }

    async fn with_timeout<T>(&self, future: impl Future<Output = Result<T, FetchError>>) -> Result<T, FetchError> {
        match tokio::time::timeout(self.policy.timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.policy.timeout.as_millis() as u64)),
        }
    }
}
