//! Worklist construction
//!
//! Items come from explicit object names and from listing whole schemas.
//! Identical items keep their first position; the same source object with
//! different target pairings stays as separate items. Discovered objects
//! already named explicitly are not added again. Skipped objects are
//! dropped before anything is dispatched.

use crate::orchestrator::RunError;
use ddlcompare_catalog::{FetchError, ObjectLister};
use ddlcompare_core::{AllowlistRules, ObjectName};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// One object to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Source-side name
    pub object: ObjectName,

    /// Name to look up in every target, when it differs from the source
    pub default_target: Option<ObjectName>,

    /// Per-target overrides, keyed by target label
    pub per_target: BTreeMap<String, ObjectName>,
}

impl WorkItem {
    pub fn new(object: ObjectName) -> Self {
        Self {
            object,
            default_target: None,
            per_target: BTreeMap::new(),
        }
    }

    /// Parse `source_name` or `source_name=target_name`
    pub fn parse(text: &str) -> Self {
        match text.split_once('=') {
            Some((source, target)) if !target.trim().is_empty() => Self {
                default_target: Some(ObjectName::parse(target.trim())),
                ..Self::new(ObjectName::parse(source.trim()))
            },
            Some((source, _)) => Self::new(ObjectName::parse(source.trim())),
            None => Self::new(ObjectName::parse(text.trim())),
        }
    }

    /// Override the name looked up in one target
    pub fn with_target_name(mut self, label: impl Into<String>, name: ObjectName) -> Self {
        self.per_target.insert(label.into(), name);
        self
    }

    /// Name to look up in the target with this label
    pub fn target_name(&self, label: &str) -> &ObjectName {
        self.per_target
            .get(label)
            .or(self.default_target.as_ref())
            .unwrap_or(&self.object)
    }
}

/// Explicit items plus schemas to discover
#[derive(Debug, Clone, Default)]
pub struct Worklist {
    pub items: Vec<WorkItem>,
    pub discover: Vec<String>,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, item: WorkItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn objects<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.items.extend(names.into_iter().map(|n| WorkItem::parse(n.as_ref())));
        self
    }

    /// List every object of `schema` in the source
    pub fn discover(mut self, schema: impl Into<String>) -> Self {
        self.discover.push(schema.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.discover.is_empty()
    }

    /// Final item list: explicit items, then discovered ones, minus skips
    pub async fn resolve(
        &self,
        lister: Option<&dyn ObjectLister>,
        allowlist: &AllowlistRules,
        timeout: Duration,
    ) -> Result<Vec<WorkItem>, RunError> {
        let mut items: Vec<WorkItem> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !items.contains(item) {
                items.push(item.clone());
            }
        }

        if !self.discover.is_empty() {
            let lister = lister.ok_or_else(|| {
                RunError::Configuration("schema discovery requested but no object lister is configured".to_string())
            })?;

            for schema in &self.discover {
                let listed = match tokio::time::timeout(timeout, lister.list(schema)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(timeout.as_millis() as u64)),
                }
                .map_err(|error| RunError::Discovery {
                    schema: schema.clone(),
                    error,
                })?;

                info!(schema = %schema, objects = listed.len(), "Discovered objects");
                let known: HashSet<ObjectName> = items.iter().map(|i| i.object.clone()).collect();
                items.extend(listed.into_iter().filter(|o| !known.contains(o)).map(WorkItem::new));
            }
        }

        items.retain(|item| {
            let skipped = allowlist.is_object_skipped(&item.object.to_string())
                || allowlist.is_object_skipped(&item.object.short().to_string());
            if skipped {
                debug!(object = %item.object, "Skipping object");
            }
            !skipped
        });

        Ok(items)
    }
}
