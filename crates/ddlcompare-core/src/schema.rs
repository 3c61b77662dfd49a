//! Schema model and canonical type system

use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};

/// Coarse type class used by family-only equivalence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeClass {
    Boolean,
    Integer,
    Decimal,
    Float,
    String,
    Binary,
    Temporal,
    Json,
    Other,
}

impl std::fmt::Display for TypeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Temporal => "temporal",
            Self::Json => "json",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Canonical type family
///
/// Dialect type tokens map onto these; unrecognized tokens become
/// `Unknown` with a best-effort class guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFamily {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Decimal,
    Float32,
    Float64,
    /// Fixed-length character string
    Char,
    /// Variable-length character string (unbounded when no length)
    Varchar,
    Binary,
    Varbinary,
    Date,
    Time,
    Timestamp,
    /// Timestamp with time zone
    TimestampTz,
    Interval,
    Json,
    Uuid,
    /// Unrecognized dialect token
    Unknown(TypeClass),
}

impl TypeFamily {
    /// Coarse class of this family
    pub fn class(&self) -> TypeClass {
        match self {
            Self::Boolean => TypeClass::Boolean,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => TypeClass::Integer,
            Self::Decimal => TypeClass::Decimal,
            Self::Float32 | Self::Float64 => TypeClass::Float,
            Self::Char | Self::Varchar | Self::Uuid => TypeClass::String,
            Self::Binary | Self::Varbinary => TypeClass::Binary,
            Self::Date | Self::Time | Self::Timestamp | Self::TimestampTz | Self::Interval => {
                TypeClass::Temporal
            }
            Self::Json => TypeClass::Json,
            Self::Unknown(class) => *class,
        }
    }

    /// Canonical spelling used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Decimal => "DECIMAL",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::Char => "CHAR",
            Self::Varchar => "VARCHAR",
            Self::Binary => "BINARY",
            Self::Varbinary => "VARBINARY",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampTz => "TIMESTAMPTZ",
            Self::Interval => "INTERVAL",
            Self::Json => "JSON",
            Self::Uuid => "UUID",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TypeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(class) => write!(f, "UNKNOWN({})", class),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Dialect-independent column type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalType {
    /// Type family
    pub family: TypeFamily,

    /// Character/binary length (None = unbounded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Numeric precision, or fractional seconds precision for time families
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,

    /// Numeric scale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,

    /// Type token as written in the source
    pub raw: String,
}

impl CanonicalType {
    /// Create an unbounded type of the given family
    pub fn new(family: TypeFamily, raw: impl Into<String>) -> Self {
        Self {
            family,
            length: None,
            precision: None,
            scale: None,
            raw: raw.into(),
        }
    }

    /// Set the length
    pub fn with_length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    /// Set precision and scale
    pub fn with_precision(mut self, precision: Option<u32>, scale: Option<u32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    /// Coarse class of this type
    pub fn class(&self) -> TypeClass {
        self.family.class()
    }
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let TypeFamily::Unknown(_) = self.family {
            return write!(f, "{}", self.raw);
        }
        write!(f, "{}", self.family.as_str())?;
        match (self.length, self.precision, self.scale) {
            (Some(len), _, _) => write!(f, "({})", len),
            (None, Some(p), Some(s)) => write!(f, "({}, {})", p, s),
            (None, Some(p), None) => write!(f, "({})", p),
            _ => Ok(()),
        }
    }
}

/// Kind of schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Table,
    View,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "TABLE"),
            Self::View => write!(f, "VIEW"),
        }
    }
}

/// Qualified object name
///
/// Parts are stored already folded: unquoted identifiers lower-cased,
/// quoted identifiers verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct ObjectName {
    parts: Vec<String>,
}

impl ObjectName {
    /// Create from already-folded parts
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a dotted name as typed by a user (`schema.table`)
    ///
    /// Double-quoted parts keep their case, everything else is lower-cased.
    pub fn parse(text: &str) -> Self {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut was_quoted = false;

        for ch in text.trim().chars() {
            match ch {
                '"' => {
                    quoted = !quoted;
                    was_quoted = true;
                }
                '.' if !quoted => {
                    parts.push(fold_part(&current, was_quoted));
                    current.clear();
                    was_quoted = false;
                }
                _ => current.push(ch),
            }
        }
        if !current.is_empty() || was_quoted {
            parts.push(fold_part(&current, was_quoted));
        }

        Self { parts }
    }

    /// All parts, outermost first
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Object name (last part)
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    /// Schema (second-to-last part), if qualified
    pub fn schema(&self) -> Option<&str> {
        if self.parts.len() >= 2 {
            Some(self.parts[self.parts.len() - 2].as_str())
        } else {
            None
        }
    }

    /// The trailing `schema.name` (or just `name`) of this identifier
    pub fn short(&self) -> ObjectName {
        let skip = self.parts.len().saturating_sub(2);
        Self {
            parts: self.parts[skip..].to_vec(),
        }
    }

    /// True when both names agree on their common trailing parts
    ///
    /// `db.sales.orders` matches `sales.orders` and `orders`.
    pub fn matches(&self, other: &ObjectName) -> bool {
        if self.parts.is_empty() || other.parts.is_empty() {
            return false;
        }
        self.parts
            .iter()
            .rev()
            .zip(other.parts.iter().rev())
            .all(|(a, b)| a == b)
    }

    /// Qualify an unqualified name with a schema
    pub fn with_default_schema(&self, schema: &str) -> ObjectName {
        if self.parts.len() >= 2 {
            self.clone()
        } else {
            Self::new([schema.to_string(), self.name().to_string()])
        }
    }
}

fn fold_part(part: &str, quoted: bool) -> String {
    if quoted {
        part.to_string()
    } else {
        part.trim().to_lowercase()
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

impl From<ObjectName> for String {
    fn from(name: ObjectName) -> Self {
        name.to_string()
    }
}

impl From<String> for ObjectName {
    fn from(text: String) -> Self {
        ObjectName::parse(&text)
    }
}

impl From<&str> for ObjectName {
    fn from(text: &str) -> Self {
        ObjectName::parse(text)
    }
}

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name (folded like identifiers)
    pub name: String,

    /// Canonical type
    pub data_type: CanonicalType,

    /// Whether the column accepts NULL
    pub nullable: bool,

    /// Default expression as written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Collation name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

impl ColumnSpec {
    /// Create a nullable column without default or collation
    pub fn new(name: impl Into<String>, data_type: CanonicalType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            collation: None,
        }
    }

    /// Mark NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default expression
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the collation
    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }
}

/// Constraint kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrimaryKey => write!(f, "PRIMARY KEY"),
            Self::ForeignKey => write!(f, "FOREIGN KEY"),
            Self::Unique => write!(f, "UNIQUE"),
        }
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignReference {
    /// Referenced object
    pub object: ObjectName,

    /// Referenced columns (may be empty = referenced primary key)
    pub columns: Vec<String>,
}

/// A table constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintSpec {
    /// Constraint kind
    pub kind: ConstraintKind,

    /// Declared name, if any (not compared)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Constrained columns, in declaration order
    pub columns: Vec<String>,

    /// Referenced object and columns (foreign keys only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignReference>,
}

impl ConstraintSpec {
    /// Primary key over `columns`
    pub fn primary_key<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            kind: ConstraintKind::PrimaryKey,
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            references: None,
        }
    }

    /// Unique constraint over `columns`
    pub fn unique<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            kind: ConstraintKind::Unique,
            ..Self::primary_key(columns)
        }
    }

    /// Foreign key from `columns` to `object(ref_columns)`
    pub fn foreign_key<S: Into<String>, R: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        object: ObjectName,
        ref_columns: impl IntoIterator<Item = R>,
    ) -> Self {
        Self {
            kind: ConstraintKind::ForeignKey,
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            references: Some(ForeignReference {
                object,
                columns: ref_columns.into_iter().map(Into::into).collect(),
            }),
        }
    }

    /// Set the declared name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Short description used in mismatch notes
    pub fn describe(&self) -> String {
        let mut text = format!("{} ({})", self.kind, self.columns.join(", "));
        if let Some(reference) = &self.references {
            text.push_str(&format!(
                " REFERENCES {}({})",
                reference.object,
                reference.columns.join(", ")
            ));
        }
        text
    }
}

/// A parsed table or view definition
///
/// Produced once by the parser and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaObject {
    /// Qualified name
    pub name: ObjectName,

    /// Table or view
    pub kind: ObjectKind,

    /// Dialect the definition came from
    pub dialect: Dialect,

    /// Columns in declaration order (tables only)
    pub columns: Vec<ColumnSpec>,

    /// Constraints (tables only)
    pub constraints: Vec<ConstraintSpec>,

    /// Normalized view body (views only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_body: Option<String>,
}

impl SchemaObject {
    /// Create a table
    pub fn table(
        name: ObjectName,
        dialect: Dialect,
        columns: Vec<ColumnSpec>,
        constraints: Vec<ConstraintSpec>,
    ) -> Self {
        Self {
            name,
            kind: ObjectKind::Table,
            dialect,
            columns,
            constraints,
            view_body: None,
        }
    }

    /// Create a view
    pub fn view(name: ObjectName, dialect: Dialect, body: impl Into<String>) -> Self {
        Self {
            name,
            kind: ObjectKind::View,
            dialect,
            columns: Vec::new(),
            constraints: Vec::new(),
            view_body: Some(body.into()),
        }
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// One raw CREATE statement pulled from a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatement {
    /// Label of the source it came from (file path, catalog name)
    pub source: String,

    /// Qualified object name
    pub name: ObjectName,

    /// Table or view
    pub kind: ObjectKind,

    /// Statement text, without the trailing terminator
    pub text: String,
}

impl RawStatement {
    /// Create a raw statement
    pub fn new(
        source: impl Into<String>,
        name: ObjectName,
        kind: ObjectKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            name,
            kind,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_type_display() {
        let varchar = CanonicalType::new(TypeFamily::Varchar, "VARCHAR(50)").with_length(Some(50));
        assert_eq!(varchar.to_string(), "VARCHAR(50)");

        let decimal =
            CanonicalType::new(TypeFamily::Decimal, "NUMERIC(10,2)").with_precision(Some(10), Some(2));
        assert_eq!(decimal.to_string(), "DECIMAL(10, 2)");

        let unknown = CanonicalType::new(TypeFamily::Unknown(TypeClass::Temporal), "PERIOD(DATE)");
        assert_eq!(unknown.to_string(), "PERIOD(DATE)");
        assert_eq!(unknown.class(), TypeClass::Temporal);
    }

    #[test]
    fn object_name_parsing() {
        let name = ObjectName::parse("Sales.Orders");
        assert_eq!(name.parts(), &["sales".to_string(), "orders".to_string()]);
        assert_eq!(name.schema(), Some("sales"));
        assert_eq!(name.name(), "orders");

        let quoted = ObjectName::parse("\"Sales\".\"Order.Items\"");
        assert_eq!(quoted.parts(), &["Sales".to_string(), "Order.Items".to_string()]);

        let bare = ObjectName::parse("orders");
        assert_eq!(bare.schema(), None);
        assert_eq!(bare.with_default_schema("sales").to_string(), "sales.orders");
    }

    #[test]
    fn object_name_suffix_matching() {
        let full = ObjectName::parse("db.sales.orders");
        assert!(full.matches(&ObjectName::parse("sales.orders")));
        assert!(full.matches(&ObjectName::parse("orders")));
        assert!(!full.matches(&ObjectName::parse("hr.orders")));
        assert_eq!(full.short().to_string(), "sales.orders");
    }

    #[test]
    fn schema_object_lookup() {
        let int = CanonicalType::new(TypeFamily::Int32, "INTEGER");
        let table = SchemaObject::table(
            ObjectName::parse("s.t"),
            Dialect::Ansi,
            vec![ColumnSpec::new("id", int.clone()).not_null(), ColumnSpec::new("qty", int)],
            vec![ConstraintSpec::primary_key(["id"])],
        );

        assert_eq!(table.column_names(), vec!["id", "qty"]);
        assert!(!table.find_column("id").unwrap().nullable);
        assert!(table.find_column("missing").is_none());
    }

    #[test]
    fn constraint_description() {
        let fk = ConstraintSpec::foreign_key(["customer_id"], ObjectName::parse("s.customers"), ["id"]);
        assert_eq!(fk.describe(), "FOREIGN KEY (customer_id) REFERENCES s.customers(id)");
    }
}
