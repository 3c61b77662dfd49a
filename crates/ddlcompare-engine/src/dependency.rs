//! Dependency resolver
//!
//! Breadth-first walk over the objects a definition references. Every
//! object is looked up at most once per resolution; the walk stops at the
//! depth limit or when nothing new turns up. Dependencies that cannot be
//! resolved are recorded and skipped.

use ddlcompare_catalog::{CatalogSession, FetchError};
use ddlcompare_core::{Dialect, ObjectName, RawStatement};
use ddlcompare_sql::{referenced_objects, SqlParser};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

/// A dependency left out of the closure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyFailure {
    #[error("{object}: {error}")]
    Lookup { object: ObjectName, error: FetchError },

    #[error("{object}: not found")]
    NotFound { object: ObjectName },

    #[error("{object}: unparseable definition ({reason})")]
    Unparseable { object: ObjectName, reason: String },
}

impl DependencyFailure {
    pub fn object(&self) -> &ObjectName {
        match self {
            Self::Lookup { object, .. } | Self::NotFound { object } | Self::Unparseable { object, .. } => object,
        }
    }
}

/// Result of resolving one root object
#[derive(Debug, Clone)]
pub struct Resolution {
    pub root: ObjectName,

    /// Resolved dependencies in discovery order
    pub resolved: Vec<ObjectName>,

    /// Definitions of `resolved`, dependencies before their dependents
    pub definitions: Vec<RawStatement>,

    pub failures: Vec<DependencyFailure>,
}

impl Resolution {
    /// Failure descriptions for the report
    pub fn unresolved(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

/// Walks references through a catalog session
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    dialect: Dialect,
    depth_limit: usize,
    fetch_timeout: Duration,
}

impl DependencyResolver {
    pub fn new(dialect: Dialect, depth_limit: usize, fetch_timeout: Duration) -> Self {
        Self {
            dialect,
            depth_limit,
            fetch_timeout,
        }
    }

    /// Resolve the dependency closure of `root`
    pub async fn resolve(&self, session: &dyn CatalogSession, root: &RawStatement) -> Resolution {
        let parser = SqlParser::new(self.dialect);

        let mut visited: HashSet<ObjectName> = HashSet::from([root.name.clone()]);
        let mut edges: HashMap<ObjectName, Vec<ObjectName>> = HashMap::new();
        let mut fetched: HashMap<ObjectName, RawStatement> = HashMap::new();
        let mut resolved = Vec::new();
        let mut failures = Vec::new();

        let mut queue = VecDeque::from([(root.clone(), 0usize)]);

        while let Some((statement, depth)) = queue.pop_front() {
            if depth >= self.depth_limit {
                debug!(object = %statement.name, depth, "Dependency depth limit reached");
                continue;
            }

            let references = match referenced_objects(self.dialect, &statement.text) {
                Ok(references) => references,
                Err(e) => {
                    warn!(object = %statement.name, "Could not scan references: {}", e);
                    continue;
                }
            };

            let mut children = Vec::new();
            for reference in references {
                let name = qualify(reference, &statement.name);
                if name.matches(&root.name) && name.parts().len() <= root.name.parts().len() {
                    continue;
                }
                children.push(name.clone());
                if !visited.insert(name.clone()) {
                    continue;
                }

                match self.lookup(session, &name).await {
                    Ok(Some(definition)) => match parser.parse_statement(&definition) {
                        Ok(_) => {
                            debug!(object = %name, depth = depth + 1, "Resolved dependency");
                            resolved.push(definition.name.clone());
                            fetched.insert(name, definition.clone());
                            queue.push_back((definition, depth + 1));
                        }
                        Err(e) => failures.push(DependencyFailure::Unparseable {
                            object: name,
                            reason: e.kind.to_string(),
                        }),
                    },
                    Ok(None) => failures.push(DependencyFailure::NotFound { object: name }),
                    Err(error) => failures.push(DependencyFailure::Lookup { object: name, error }),
                }
            }
            edges.insert(statement.name.clone(), children);
        }

        for failure in &failures {
            warn!(root = %root.name, "Dependency excluded: {}", failure);
        }

        Resolution {
            root: root.name.clone(),
            definitions: dependency_order(&root.name, &edges, &fetched),
            resolved,
            failures,
        }
    }

    async fn lookup(&self, session: &dyn CatalogSession, name: &ObjectName) -> Result<Option<RawStatement>, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, session.fetch_definition(name)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout.as_millis() as u64)),
        }
    }
}

/// Unqualified references live in the referencing object's schema
fn qualify(reference: ObjectName, referrer: &ObjectName) -> ObjectName {
    match referrer.schema() {
        Some(schema) if reference.parts().len() == 1 => reference.with_default_schema(schema),
        _ => reference,
    }
}

/// Post-order walk from the root: every definition follows its dependencies
fn dependency_order(
    root: &ObjectName,
    edges: &HashMap<ObjectName, Vec<ObjectName>>,
    fetched: &HashMap<ObjectName, RawStatement>,
) -> Vec<RawStatement> {
    fn visit(
        name: &ObjectName,
        edges: &HashMap<ObjectName, Vec<ObjectName>>,
        fetched: &HashMap<ObjectName, RawStatement>,
        seen: &mut HashSet<ObjectName>,
        out: &mut Vec<RawStatement>,
    ) {
        if !seen.insert(name.clone()) {
            return;
        }
        for child in edges.get(name).into_iter().flatten() {
            visit(child, edges, fetched, seen, out);
        }
        if let Some(definition) = fetched.get(name) {
            out.push(definition.clone());
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    visit(root, edges, fetched, &mut seen, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddlcompare_catalog::{CatalogConnector, MockCatalogBuilder};
    use pretty_assertions::assert_eq;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn names(definitions: &[RawStatement]) -> Vec<String> {
        definitions.iter().map(|d| d.name.to_string()).collect()
    }

    #[tokio::test]
    async fn test_shared_dependency_looked_up_once() {
        let catalog = MockCatalogBuilder::new("src", Dialect::Postgres)
            .with_sql("CREATE TABLE s.t1 (id INT PRIMARY KEY)")
            .with_sql("CREATE TABLE s.t2 (id INT, t1_id INT REFERENCES s.t1(id))")
            .with_sql("CREATE VIEW s.v1 AS SELECT * FROM s.t1 JOIN s.t2 ON s.t1.id = s.t2.t1_id")
            .build();
        let session = catalog.connect().await.unwrap();
        let root = session.fetch_definition(&ObjectName::parse("s.v1")).await.unwrap().unwrap();

        let resolver = DependencyResolver::new(Dialect::Postgres, 10, TIMEOUT);
        let resolution = resolver.resolve(session.as_ref(), &root).await;

        assert_eq!(
            resolution.resolved.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["s.t1", "s.t2"]
        );
        assert_eq!(names(&resolution.definitions), vec!["s.t1", "s.t2"]);
        assert!(resolution.failures.is_empty());
        assert_eq!(catalog.lookup_count("s.t1").await, 1);
        assert_eq!(catalog.lookup_count("s.t2").await, 1);
    }

    #[tokio::test]
    async fn test_definitions_are_dependency_first() {
        // v -> a -> b, discovered v: a; a: b
        let catalog = MockCatalogBuilder::new("src", Dialect::Postgres)
            .with_sql("CREATE VIEW s.v AS SELECT * FROM s.a, s.c")
            .with_sql("CREATE VIEW s.a AS SELECT * FROM s.b")
            .with_sql("CREATE VIEW s.c AS SELECT * FROM s.a")
            .with_sql("CREATE TABLE s.b (id INT)")
            .build();
        let session = catalog.connect().await.unwrap();
        let root = session.fetch_definition(&ObjectName::parse("s.v")).await.unwrap().unwrap();

        let resolution = DependencyResolver::new(Dialect::Postgres, 10, TIMEOUT)
            .resolve(session.as_ref(), &root)
            .await;
        assert_eq!(names(&resolution.definitions), vec!["s.b", "s.a", "s.c"]);
    }

    #[tokio::test]
    async fn test_unqualified_references_use_referrer_schema() {
        let catalog = MockCatalogBuilder::new("src", Dialect::Postgres)
            .with_sql("CREATE VIEW sales.v AS SELECT * FROM orders")
            .with_sql("CREATE TABLE sales.orders (id INT)")
            .build();
        let session = catalog.connect().await.unwrap();
        let root = session.fetch_definition(&ObjectName::parse("sales.v")).await.unwrap().unwrap();

        let resolution = DependencyResolver::new(Dialect::Postgres, 10, TIMEOUT)
            .resolve(session.as_ref(), &root)
            .await;
        assert_eq!(resolution.resolved, vec![ObjectName::parse("sales.orders")]);
    }

    #[tokio::test]
    async fn test_failures_are_excluded() {
        let catalog = MockCatalogBuilder::new("src", Dialect::Postgres)
            .with_sql("CREATE VIEW s.v AS SELECT * FROM s.ok, s.missing, s.broken, s.locked")
            .with_sql("CREATE TABLE s.ok (id INT)")
            .with_sql("CREATE TABLE s.broken (id INT,, x INT)")
            .with_error("s.locked", FetchError::PermissionDenied("no grant".to_string()))
            .build();
        let session = catalog.connect().await.unwrap();
        let root = session.fetch_definition(&ObjectName::parse("s.v")).await.unwrap().unwrap();

        let resolution = DependencyResolver::new(Dialect::Postgres, 10, TIMEOUT)
            .resolve(session.as_ref(), &root)
            .await;

        assert_eq!(resolution.resolved, vec![ObjectName::parse("s.ok")]);
        let failed: Vec<_> = resolution.failures.iter().map(|f| f.object().to_string()).collect();
        assert_eq!(failed, vec!["s.missing", "s.broken", "s.locked"]);
        assert!(matches!(resolution.failures[0], DependencyFailure::NotFound { .. }));
        assert!(matches!(resolution.failures[1], DependencyFailure::Unparseable { .. }));
        assert!(matches!(resolution.failures[2], DependencyFailure::Lookup { .. }));
        assert_eq!(resolution.unresolved().len(), 3);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let catalog = MockCatalogBuilder::new("src", Dialect::Postgres)
            .with_sql("CREATE VIEW s.v AS SELECT * FROM s.a")
            .with_sql("CREATE VIEW s.a AS SELECT * FROM s.b")
            .with_sql("CREATE TABLE s.b (id INT)")
            .build();
        let session = catalog.connect().await.unwrap();
        let root = session.fetch_definition(&ObjectName::parse("s.v")).await.unwrap().unwrap();

        let resolution = DependencyResolver::new(Dialect::Postgres, 1, TIMEOUT)
            .resolve(session.as_ref(), &root)
            .await;
        assert_eq!(resolution.resolved, vec![ObjectName::parse("s.a")]);
        assert_eq!(catalog.lookup_count("s.b").await, 0);
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        let catalog = MockCatalogBuilder::new("src", Dialect::Postgres)
            .with_sql("CREATE TABLE s.a (id INT, b_id INT REFERENCES s.b(id))")
            .with_sql("CREATE TABLE s.b (id INT, a_id INT REFERENCES s.a(id))")
            .build();
        let session = catalog.connect().await.unwrap();
        let root = session.fetch_definition(&ObjectName::parse("s.a")).await.unwrap().unwrap();

        let resolution = DependencyResolver::new(Dialect::Postgres, 10, TIMEOUT)
            .resolve(session.as_ref(), &root)
            .await;
        assert_eq!(resolution.resolved, vec![ObjectName::parse("s.b")]);
        assert_eq!(catalog.lookup_count("s.a").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout() {
        let catalog = MockCatalogBuilder::new("src", Dialect::Postgres)
            .with_sql("CREATE VIEW s.v AS SELECT * FROM s.t")
            .with_sql("CREATE TABLE s.t (id INT)")
            .with_latency(1_000)
            .build();
        let session = catalog.connect().await.unwrap();
        let root = RawStatement::new(
            "src",
            ObjectName::parse("s.v"),
            ddlcompare_core::ObjectKind::View,
            "CREATE VIEW s.v AS SELECT * FROM s.t",
        );

        let resolution = DependencyResolver::new(Dialect::Postgres, 10, Duration::from_millis(100))
            .resolve(session.as_ref(), &root)
            .await;
        assert_eq!(
            resolution.failures,
            vec![DependencyFailure::Lookup {
                object: ObjectName::parse("s.t"),
                error: FetchError::Timeout(100),
            }]
        );
    }
}
