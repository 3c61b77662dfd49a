//! PostgreSQL catalog
//!
//! Synthesizes CREATE statements from `information_schema` and
//! `pg_get_viewdef`, so live objects go through the same parser as SQL
//! text. Requires the `postgres` feature; without it every connect fails
//! with a configuration error.
//!
//! Credentials are resolved on every connect and dropped once the
//! connection is established.

use crate::secrets::SecretResolver;
use crate::source::{CatalogConnector, CatalogSession, FetchError, ObjectLister};
use ddlcompare_core::{Dialect, ObjectName};
use std::collections::BTreeSet;
use std::sync::Arc;

#[cfg(feature = "postgres")]
use {
    ddlcompare_core::{ObjectKind, RawStatement},
    ddlcompare_sql::profile::{profile, render_list_query, render_query},
    native_tls::TlsConnector,
    postgres_native_tls::MakeTlsConnector,
    tokio_postgres::{error::SqlState, Client, Config as PgConfig, NoTls, Row},
};

#[cfg(feature = "postgres")]
const OBJECT_KIND_QUERY: &str = "SELECT table_type::text FROM information_schema.tables \
     WHERE table_schema = {schema} AND table_name = {name}";

/// Connector for a live PostgreSQL database
pub struct PostgresCatalog {
    label: String,
    secret_id: String,
    resolver: Arc<dyn SecretResolver>,
    tls: bool,
    default_schema: String,
}

impl PostgresCatalog {
    pub fn new(label: impl Into<String>, secret_id: impl Into<String>, resolver: Arc<dyn SecretResolver>) -> Self {
        Self {
            label: label.into(),
            secret_id: secret_id.into(),
            resolver,
            tls: false,
            default_schema: "public".to_string(),
        }
    }

    /// Connect with TLS (sslmode in the connection string is ignored)
    pub fn with_tls(mut self) -> Self {
        self.tls = true;
        self
    }

    /// Schema used for unqualified object names
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    #[cfg(feature = "postgres")]
    async fn open(&self) -> Result<PostgresSession, FetchError> {
        let credentials = self.resolver.resolve(Dialect::Postgres, &self.secret_id).await?;

        let mut config: PgConfig = credentials
            .url
            .parse()
            .map_err(|e| FetchError::ConfigError(format!("Invalid connection string: {}", e)))?;
        config.user(&credentials.user);
        if !credentials.password.is_empty() {
            config.password(&credentials.password);
        }
        drop(credentials);

        let label = self.label.clone();
        let client = if self.tls {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| FetchError::ConfigError(format!("Failed to create TLS connector: {}", e)))?;
            let (client, connection) = config
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(connect_error)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(source = %label, "PostgreSQL TLS connection error: {}", e);
                }
            });
            client
        } else {
            let (client, connection) = config.connect(NoTls).await.map_err(connect_error)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(source = %label, "PostgreSQL connection error: {}", e);
                }
            });
            client
        };

        tracing::debug!(source = %self.label, tls = self.tls, "connected to PostgreSQL");
        Ok(PostgresSession {
            client,
            label: self.label.clone(),
            default_schema: self.default_schema.clone(),
        })
    }
}

#[async_trait::async_trait]
impl CatalogConnector for PostgresCatalog {
    fn label(&self) -> &str {
        &self.label
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    #[cfg(feature = "postgres")]
    async fn connect(&self) -> Result<Box<dyn CatalogSession>, FetchError> {
        Ok(Box::new(self.open().await?))
    }

    #[cfg(not(feature = "postgres"))]
    async fn connect(&self) -> Result<Box<dyn CatalogSession>, FetchError> {
        Err(not_compiled())
    }
}

#[async_trait::async_trait]
impl ObjectLister for PostgresCatalog {
    async fn list(&self, schema: &str) -> Result<BTreeSet<ObjectName>, FetchError> {
        let session = self.connect().await?;
        session.list_objects(schema).await
    }
}

#[cfg(not(feature = "postgres"))]
fn not_compiled() -> FetchError {
    FetchError::ConfigError(
        "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string(),
    )
}

/// Open PostgreSQL connection owned by one worker
#[cfg(feature = "postgres")]
pub struct PostgresSession {
    client: Client,
    label: String,
    default_schema: String,
}

#[cfg(feature = "postgres")]
impl PostgresSession {
    fn qualify(&self, object: &ObjectName) -> ObjectName {
        object.short().with_default_schema(&self.default_schema)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, FetchError> {
        self.client.query(sql, &[]).await.map_err(query_error)
    }

    async fn describe_table(&self, object: &ObjectName) -> Result<String, FetchError> {
        let profile = profile(Dialect::Postgres);
        let (Some(columns_sql), Some(constraints_sql)) =
            (profile.describe_columns, profile.describe_constraints)
        else {
            return Err(FetchError::ConfigError("no describe queries for PostgreSQL".to_string()));
        };

        let columns = self
            .query(&render_query(columns_sql, object, ObjectKind::Table))
            .await?
            .iter()
            .map(column_row)
            .collect::<Result<Vec<_>, _>>()?;
        let constraints = self
            .query(&render_query(constraints_sql, object, ObjectKind::Table))
            .await?
            .iter()
            .map(constraint_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(synthesize_table(object, &columns, &constraints))
    }

    async fn describe_view(&self, object: &ObjectName) -> Result<Option<String>, FetchError> {
        let Some(template) = profile(Dialect::Postgres).view_definition else {
            return Err(FetchError::ConfigError("no view query for PostgreSQL".to_string()));
        };

        let rows = self.query(&render_query(template, object, ObjectKind::View)).await?;
        let body: Option<String> = match rows.first() {
            Some(row) => get(row, 0)?,
            None => None,
        };
        Ok(body.map(|body| synthesize_view(object, &body)))
    }
}

#[cfg(feature = "postgres")]
#[async_trait::async_trait]
impl CatalogSession for PostgresSession {
    async fn fetch_definition(&self, object: &ObjectName) -> Result<Option<RawStatement>, FetchError> {
        let object = self.qualify(object);

        let rows = self
            .query(&render_query(OBJECT_KIND_QUERY, &object, ObjectKind::Table))
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let table_type: String = get(row, 0)?;

        let (kind, text) = if table_type == "VIEW" {
            match self.describe_view(&object).await? {
                Some(text) => (ObjectKind::View, text),
                None => return Ok(None),
            }
        } else {
            (ObjectKind::Table, self.describe_table(&object).await?)
        };

        tracing::debug!(source = %self.label, object = %object, %kind, "fetched definition");
        Ok(Some(RawStatement::new(self.label.clone(), object, kind, text)))
    }

    async fn list_objects(&self, schema: &str) -> Result<BTreeSet<ObjectName>, FetchError> {
        let sql = render_list_query(profile(Dialect::Postgres).list_objects, schema);
        let mut names = BTreeSet::new();
        for row in self.query(&sql).await? {
            let name: String = get(&row, 0)?;
            names.insert(ObjectName::new([schema.to_string(), name]));
        }
        Ok(names)
    }
}

#[cfg(feature = "postgres")]
fn get<'a, T: tokio_postgres::types::FromSql<'a>>(row: &'a Row, idx: usize) -> Result<T, FetchError> {
    row.try_get(idx)
        .map_err(|e| FetchError::InvalidResponse(format!("column {}: {}", idx, e)))
}

#[cfg(feature = "postgres")]
fn column_row(row: &Row) -> Result<CatalogColumn, FetchError> {
    let is_nullable: String = get(row, 6)?;
    Ok(CatalogColumn {
        name: get(row, 0)?,
        data_type: get(row, 1)?,
        char_length: get(row, 2)?,
        numeric_precision: get(row, 3)?,
        numeric_scale: get(row, 4)?,
        datetime_precision: get(row, 5)?,
        nullable: is_nullable == "YES",
        default: get(row, 7)?,
        collation: get(row, 8)?,
        udt_name: get(row, 9)?,
    })
}

#[cfg(feature = "postgres")]
fn constraint_row(row: &Row) -> Result<CatalogConstraint, FetchError> {
    let ref_schema: Option<String> = get(row, 3)?;
    let ref_table: Option<String> = get(row, 4)?;
    Ok(CatalogConstraint {
        name: get(row, 0)?,
        kind: get(row, 1)?,
        column: get(row, 2)?,
        referenced: ref_schema.zip(ref_table).map(|(s, t)| ObjectName::new([s, t])),
        referenced_column: get(row, 5)?,
    })
}

#[cfg(feature = "postgres")]
fn connect_error(e: tokio_postgres::Error) -> FetchError {
    match e.code() {
        Some(code)
            if *code == SqlState::INVALID_PASSWORD
                || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION =>
        {
            FetchError::AuthenticationError(e.to_string())
        }
        _ => FetchError::NetworkError(format!("Failed to connect: {}", e)),
    }
}

#[cfg(feature = "postgres")]
fn query_error(e: tokio_postgres::Error) -> FetchError {
    if e.is_closed() {
        return FetchError::NetworkError(e.to_string());
    }
    match e.code() {
        Some(code) if *code == SqlState::INSUFFICIENT_PRIVILEGE => FetchError::PermissionDenied(e.to_string()),
        _ => FetchError::QueryError(e.to_string()),
    }
}

/// One row of the column description query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    /// `information_schema` type name (`character varying`, `ARRAY`, ...)
    pub data_type: String,
    pub char_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
    pub datetime_precision: Option<i32>,
    pub nullable: bool,
    pub default: Option<String>,
    pub collation: Option<String>,
    /// Underlying type name (`_int4`, `citext`, ...)
    pub udt_name: Option<String>,
}

impl CatalogColumn {
    /// Type text as it would appear in a CREATE TABLE
    pub fn type_text(&self) -> String {
        let data_type = self.data_type.to_lowercase();
        match data_type.as_str() {
            "character varying" | "character" | "bit" | "bit varying" => match self.char_length {
                Some(len) => format!("{}({})", data_type, len),
                None => data_type,
            },
            "numeric" => match self.numeric_precision {
                Some(p) => format!("numeric({},{})", p, self.numeric_scale.unwrap_or(0)),
                None => data_type,
            },
            "array" => match &self.udt_name {
                Some(udt) => format!("{}[]", udt.trim_start_matches('_')),
                None => "text[]".to_string(),
            },
            "user-defined" => self.udt_name.clone().unwrap_or(data_type),
            t if t.starts_with("timestamp") || t.starts_with("time ") || t == "time" => {
                match self.datetime_precision {
                    // 6 is the PostgreSQL default and is left implicit
                    Some(p) if p != 6 => match t.split_once(' ') {
                        Some((head, tail)) => format!("{}({}) {}", head, p, tail),
                        None => format!("{}({})", t, p),
                    },
                    _ => data_type,
                }
            }
            _ => data_type,
        }
    }
}

/// One row of the key-constraint description query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConstraint {
    pub name: String,
    /// `PRIMARY KEY`, `UNIQUE` or `FOREIGN KEY`
    pub kind: String,
    pub column: String,
    pub referenced: Option<ObjectName>,
    pub referenced_column: Option<String>,
}

/// CREATE TABLE text for described columns and constraint rows
///
/// Constraint rows are grouped by name in the order given.
pub fn synthesize_table(object: &ObjectName, columns: &[CatalogColumn], constraints: &[CatalogConstraint]) -> String {
    let mut lines: Vec<String> = columns
        .iter()
        .map(|column| {
            let mut line = format!("    {} {}", quote_ident(&column.name), column.type_text());
            if let Some(collation) = &column.collation {
                line.push_str(&format!(" COLLATE {}", quote_ident(collation)));
            }
            if !column.nullable {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = &column.default {
                line.push_str(&format!(" DEFAULT {}", default));
            }
            line
        })
        .collect();

    let mut groups: Vec<(&CatalogConstraint, Vec<&str>, Vec<&str>)> = Vec::new();
    for row in constraints {
        let index = match groups.iter().position(|(first, _, _)| first.name == row.name) {
            Some(index) => index,
            None => {
                groups.push((row, Vec::new(), Vec::new()));
                groups.len() - 1
            }
        };
        let (_, cols, ref_cols) = &mut groups[index];
        if !cols.contains(&row.column.as_str()) {
            cols.push(&row.column);
        }
        if let Some(ref_col) = row.referenced_column.as_deref() {
            if !ref_cols.contains(&ref_col) {
                ref_cols.push(ref_col);
            }
        }
    }

    for (first, cols, ref_cols) in groups {
        let cols = cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let mut line = format!("    CONSTRAINT {} {} ({})", quote_ident(&first.name), first.kind, cols);
        if let Some(referenced) = &first.referenced {
            let ref_cols = ref_cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
            line.push_str(&format!(" REFERENCES {} ({})", quote_object(referenced), ref_cols));
        }
        lines.push(line);
    }

    format!("CREATE TABLE {} (\n{}\n)", quote_object(object), lines.join(",\n"))
}

/// CREATE VIEW text for a `pg_get_viewdef` body
pub fn synthesize_view(object: &ObjectName, body: &str) -> String {
    let body = body.trim().trim_end_matches(';').trim_end();
    format!("CREATE VIEW {} AS\n{}", quote_object(object), body)
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_object(object: &ObjectName) -> String {
    object.parts().iter().map(|p| quote_ident(p)).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::EnvSecretResolver;
    use ddlcompare_core::{ConstraintKind, ObjectKind, TypeFamily};
    use ddlcompare_sql::SqlParser;
    use pretty_assertions::assert_eq;

    fn column(name: &str, data_type: &str) -> CatalogColumn {
        CatalogColumn {
            name: name.to_string(),
            data_type: data_type.to_string(),
            char_length: None,
            numeric_precision: None,
            numeric_scale: None,
            datetime_precision: None,
            nullable: true,
            default: None,
            collation: None,
            udt_name: None,
        }
    }

    #[test]
    fn type_text_from_catalog_columns() {
        let varchar = CatalogColumn { char_length: Some(50), ..column("name", "character varying") };
        assert_eq!(varchar.type_text(), "character varying(50)");

        let numeric = CatalogColumn {
            numeric_precision: Some(12),
            numeric_scale: Some(2),
            ..column("total", "numeric")
        };
        assert_eq!(numeric.type_text(), "numeric(12,2)");

        let ts = CatalogColumn { datetime_precision: Some(3), ..column("at", "timestamp with time zone") };
        assert_eq!(ts.type_text(), "timestamp(3) with time zone");
        let ts_default = CatalogColumn { datetime_precision: Some(6), ..ts.clone() };
        assert_eq!(ts_default.type_text(), "timestamp with time zone");

        let array = CatalogColumn { udt_name: Some("_int4".into()), ..column("ids", "ARRAY") };
        assert_eq!(array.type_text(), "int4[]");

        let citext = CatalogColumn { udt_name: Some("citext".into()), ..column("email", "USER-DEFINED") };
        assert_eq!(citext.type_text(), "citext");
    }

    #[test]
    fn synthesized_table_parses() {
        let object = ObjectName::parse("sales.orders");
        let columns = vec![
            CatalogColumn { nullable: false, ..column("id", "integer") },
            CatalogColumn {
                char_length: Some(40),
                collation: Some("C".into()),
                ..column("code", "character varying")
            },
            CatalogColumn { default: Some("now()".into()), ..column("placed_at", "timestamp with time zone") },
            column("customer_id", "integer"),
        ];
        let constraints = vec![
            CatalogConstraint {
                name: "orders_pkey".into(),
                kind: "PRIMARY KEY".into(),
                column: "id".into(),
                referenced: None,
                referenced_column: None,
            },
            CatalogConstraint {
                name: "orders_customer_fk".into(),
                kind: "FOREIGN KEY".into(),
                column: "customer_id".into(),
                referenced: Some(ObjectName::parse("sales.customers")),
                referenced_column: Some("id".into()),
            },
        ];

        let sql = synthesize_table(&object, &columns, &constraints);
        let table = SqlParser::new(Dialect::Postgres).parse(&sql).unwrap();

        assert_eq!(table.name, object);
        assert_eq!(table.column_names(), vec!["id", "code", "placed_at", "customer_id"]);
        assert_eq!(table.find_column("code").unwrap().data_type.length, Some(40));
        assert_eq!(table.find_column("code").unwrap().collation.as_deref(), Some("C"));
        assert_eq!(
            table.find_column("placed_at").unwrap().data_type.family,
            TypeFamily::TimestampTz
        );
        assert_eq!(table.find_column("placed_at").unwrap().default.as_deref(), Some("now()"));

        let kinds: Vec<_> = table.constraints.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ConstraintKind::PrimaryKey, ConstraintKind::ForeignKey]);
        assert_eq!(
            table.constraints[1].references.as_ref().unwrap().object.to_string(),
            "sales.customers"
        );
    }

    #[test]
    fn synthesized_view_parses() {
        let object = ObjectName::parse("sales.recent");
        let sql = synthesize_view(&object, " SELECT orders.id\n   FROM sales.orders;");
        let view = SqlParser::new(Dialect::Postgres).parse(&sql).unwrap();

        assert_eq!(view.kind, ObjectKind::View);
        assert_eq!(view.view_body.as_deref(), Some("SELECT ORDERS . ID FROM SALES . ORDERS"));
    }

    #[tokio::test]
    #[cfg(not(feature = "postgres"))]
    async fn connect_without_feature_fails() {
        let catalog = PostgresCatalog::new("prod", "prod", Arc::new(EnvSecretResolver::new()));
        assert_eq!(catalog.dialect(), Dialect::Postgres);
        let err = catalog.connect().await.err().unwrap();
        assert!(matches!(err, FetchError::ConfigError(_)));
    }

    #[tokio::test]
    #[cfg(feature = "postgres")]
    async fn connect_with_missing_secret_fails() {
        let catalog = PostgresCatalog::new("prod", "postgres_test_missing", Arc::new(EnvSecretResolver::new()));
        let err = catalog.connect().await.err().unwrap();
        assert!(matches!(err, FetchError::ConfigError(_)));
    }
}
