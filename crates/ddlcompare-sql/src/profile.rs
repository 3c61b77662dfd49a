//! Dialect capability table
//!
//! One row per dialect: splitter rules, type-mapping table, width
//! semantics and catalog-query templates. Adding a dialect means adding a
//! row to `PROFILES`.

use ddlcompare_core::{Dialect, ObjectKind, ObjectName, TypeClass, TypeFamily};

/// One row of a type-mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRule {
    /// Upper-cased type words (`DOUBLE PRECISION`)
    pub name: &'static str,

    /// Canonical family
    pub family: TypeFamily,

    /// Precision when the type is written without arguments
    pub precision: Option<u32>,

    /// Scale when the type is written without arguments
    pub scale: Option<u32>,
}

impl TypeRule {
    pub const fn new(name: &'static str, family: TypeFamily) -> Self {
        Self {
            name,
            family,
            precision: None,
            scale: None,
        }
    }

    pub const fn sized(name: &'static str, family: TypeFamily, precision: u32, scale: u32) -> Self {
        Self {
            name,
            family,
            precision: Some(precision),
            scale: Some(scale),
        }
    }
}

/// Capabilities of one dialect
#[derive(Debug)]
pub struct DialectProfile {
    pub dialect: Dialect,

    /// Line that terminates a batch (`GO`), if any
    pub batch_separator: Option<&'static str>,

    /// `[name]` quotes an identifier
    pub bracket_identifiers: bool,

    /// Dialect-specific type rules, consulted before `ANSI_TYPES`
    pub type_rules: &'static [TypeRule],

    /// Integer and float families have exact, distinguishable widths
    pub exact_widths: bool,

    /// Integers are stored as scale-0 numbers
    pub integers_as_numbers: bool,

    /// `[UNIQUE] PRIMARY INDEX (...)` may follow the column list
    pub primary_index: bool,

    /// Query returning a full CREATE statement for `{object}`
    pub show_create: Option<&'static str>,

    /// Query listing table and view names in `{schema}`
    pub list_objects: &'static str,

    /// Query describing the columns of `{schema}`.`{name}`
    pub describe_columns: Option<&'static str>,

    /// Query describing key constraints of `{schema}`.`{name}`
    pub describe_constraints: Option<&'static str>,

    /// Query returning the body of view `{schema}`.`{name}`
    pub view_definition: Option<&'static str>,
}

/// Shared ANSI type table
pub const ANSI_TYPES: &[TypeRule] = &[
    TypeRule::new("BOOLEAN", TypeFamily::Boolean),
    TypeRule::new("BOOL", TypeFamily::Boolean),
    TypeRule::new("TINYINT", TypeFamily::Int8),
    TypeRule::new("SMALLINT", TypeFamily::Int16),
    TypeRule::new("INT", TypeFamily::Int32),
    TypeRule::new("INTEGER", TypeFamily::Int32),
    TypeRule::new("BIGINT", TypeFamily::Int64),
    TypeRule::new("DECIMAL", TypeFamily::Decimal),
    TypeRule::new("DEC", TypeFamily::Decimal),
    TypeRule::new("NUMERIC", TypeFamily::Decimal),
    TypeRule::new("REAL", TypeFamily::Float32),
    TypeRule::new("FLOAT", TypeFamily::Float64),
    TypeRule::new("DOUBLE", TypeFamily::Float64),
    TypeRule::new("DOUBLE PRECISION", TypeFamily::Float64),
    TypeRule::new("CHAR", TypeFamily::Char),
    TypeRule::new("CHARACTER", TypeFamily::Char),
    TypeRule::new("NCHAR", TypeFamily::Char),
    TypeRule::new("VARCHAR", TypeFamily::Varchar),
    TypeRule::new("NVARCHAR", TypeFamily::Varchar),
    TypeRule::new("CHARACTER VARYING", TypeFamily::Varchar),
    TypeRule::new("CHAR VARYING", TypeFamily::Varchar),
    TypeRule::new("NATIONAL CHARACTER VARYING", TypeFamily::Varchar),
    TypeRule::new("TEXT", TypeFamily::Varchar),
    TypeRule::new("CLOB", TypeFamily::Varchar),
    TypeRule::new("CHARACTER LARGE OBJECT", TypeFamily::Varchar),
    TypeRule::new("BINARY", TypeFamily::Binary),
    TypeRule::new("VARBINARY", TypeFamily::Varbinary),
    TypeRule::new("BINARY VARYING", TypeFamily::Varbinary),
    TypeRule::new("BLOB", TypeFamily::Varbinary),
    TypeRule::new("BINARY LARGE OBJECT", TypeFamily::Varbinary),
    TypeRule::new("DATE", TypeFamily::Date),
    TypeRule::new("TIME", TypeFamily::Time),
    TypeRule::new("TIME WITHOUT TIME ZONE", TypeFamily::Time),
    TypeRule::new("TIME WITH TIME ZONE", TypeFamily::Time),
    TypeRule::new("TIMESTAMP", TypeFamily::Timestamp),
    TypeRule::new("TIMESTAMP WITHOUT TIME ZONE", TypeFamily::Timestamp),
    TypeRule::new("TIMESTAMP WITH TIME ZONE", TypeFamily::TimestampTz),
    TypeRule::new("TIMESTAMP WITH LOCAL TIME ZONE", TypeFamily::TimestampTz),
    TypeRule::new("INTERVAL", TypeFamily::Interval),
    TypeRule::new("JSON", TypeFamily::Json),
    TypeRule::new("UUID", TypeFamily::Uuid),
];

const POSTGRES_TYPES: &[TypeRule] = &[
    TypeRule::new("INT2", TypeFamily::Int16),
    TypeRule::new("INT4", TypeFamily::Int32),
    TypeRule::new("INT8", TypeFamily::Int64),
    TypeRule::new("SMALLSERIAL", TypeFamily::Int16),
    TypeRule::new("SERIAL", TypeFamily::Int32),
    TypeRule::new("SERIAL4", TypeFamily::Int32),
    TypeRule::new("BIGSERIAL", TypeFamily::Int64),
    TypeRule::new("SERIAL8", TypeFamily::Int64),
    TypeRule::new("FLOAT4", TypeFamily::Float32),
    TypeRule::new("FLOAT8", TypeFamily::Float64),
    TypeRule::new("BPCHAR", TypeFamily::Char),
    TypeRule::new("TIMESTAMPTZ", TypeFamily::TimestampTz),
    TypeRule::new("TIMETZ", TypeFamily::Time),
    TypeRule::new("JSONB", TypeFamily::Json),
    TypeRule::new("BYTEA", TypeFamily::Varbinary),
    TypeRule::new("MONEY", TypeFamily::Decimal),
    TypeRule::new("CITEXT", TypeFamily::Varchar),
];

const MYSQL_TYPES: &[TypeRule] = &[
    TypeRule::new("MEDIUMINT", TypeFamily::Int32),
    TypeRule::new("FLOAT", TypeFamily::Float32),
    TypeRule::new("DATETIME", TypeFamily::Timestamp),
    TypeRule::new("TINYTEXT", TypeFamily::Varchar),
    TypeRule::new("MEDIUMTEXT", TypeFamily::Varchar),
    TypeRule::new("LONGTEXT", TypeFamily::Varchar),
    TypeRule::new("TINYBLOB", TypeFamily::Varbinary),
    TypeRule::new("MEDIUMBLOB", TypeFamily::Varbinary),
    TypeRule::new("LONGBLOB", TypeFamily::Varbinary),
    TypeRule::new("YEAR", TypeFamily::Int16),
    TypeRule::new("ENUM", TypeFamily::Unknown(TypeClass::String)),
    TypeRule::new("SET", TypeFamily::Unknown(TypeClass::String)),
];

const MSSQL_TYPES: &[TypeRule] = &[
    TypeRule::new("BIT", TypeFamily::Boolean),
    TypeRule::new("TINYINT", TypeFamily::Int8),
    TypeRule::new("DATETIME", TypeFamily::Timestamp),
    TypeRule::new("DATETIME2", TypeFamily::Timestamp),
    TypeRule::new("SMALLDATETIME", TypeFamily::Timestamp),
    TypeRule::new("DATETIMEOFFSET", TypeFamily::TimestampTz),
    TypeRule::sized("MONEY", TypeFamily::Decimal, 19, 4),
    TypeRule::sized("SMALLMONEY", TypeFamily::Decimal, 10, 4),
    TypeRule::new("UNIQUEIDENTIFIER", TypeFamily::Uuid),
    TypeRule::new("NTEXT", TypeFamily::Varchar),
    TypeRule::new("IMAGE", TypeFamily::Varbinary),
    TypeRule::new("ROWVERSION", TypeFamily::Binary),
    TypeRule::new("XML", TypeFamily::Unknown(TypeClass::String)),
];

const SNOWFLAKE_TYPES: &[TypeRule] = &[
    TypeRule::sized("NUMBER", TypeFamily::Decimal, 38, 0),
    TypeRule::sized("DECIMAL", TypeFamily::Decimal, 38, 0),
    TypeRule::sized("NUMERIC", TypeFamily::Decimal, 38, 0),
    TypeRule::new("INT", TypeFamily::Int64),
    TypeRule::new("INTEGER", TypeFamily::Int64),
    TypeRule::new("BIGINT", TypeFamily::Int64),
    TypeRule::new("SMALLINT", TypeFamily::Int64),
    TypeRule::new("TINYINT", TypeFamily::Int64),
    TypeRule::new("BYTEINT", TypeFamily::Int64),
    TypeRule::new("FLOAT", TypeFamily::Float64),
    TypeRule::new("FLOAT4", TypeFamily::Float64),
    TypeRule::new("FLOAT8", TypeFamily::Float64),
    TypeRule::new("REAL", TypeFamily::Float64),
    TypeRule::new("STRING", TypeFamily::Varchar),
    TypeRule::new("DATETIME", TypeFamily::Timestamp),
    TypeRule::new("TIMESTAMP_NTZ", TypeFamily::Timestamp),
    TypeRule::new("TIMESTAMP_LTZ", TypeFamily::TimestampTz),
    TypeRule::new("TIMESTAMP_TZ", TypeFamily::TimestampTz),
    TypeRule::new("VARIANT", TypeFamily::Json),
    TypeRule::new("OBJECT", TypeFamily::Json),
    TypeRule::new("ARRAY", TypeFamily::Json),
];

const BIGQUERY_TYPES: &[TypeRule] = &[
    TypeRule::new("BOOL", TypeFamily::Boolean),
    TypeRule::new("INT64", TypeFamily::Int64),
    TypeRule::new("INT", TypeFamily::Int64),
    TypeRule::new("INTEGER", TypeFamily::Int64),
    TypeRule::new("SMALLINT", TypeFamily::Int64),
    TypeRule::new("BIGINT", TypeFamily::Int64),
    TypeRule::new("FLOAT64", TypeFamily::Float64),
    TypeRule::new("STRING", TypeFamily::Varchar),
    TypeRule::new("BYTES", TypeFamily::Varbinary),
    TypeRule::sized("NUMERIC", TypeFamily::Decimal, 38, 9),
    TypeRule::sized("BIGNUMERIC", TypeFamily::Decimal, 76, 38),
    TypeRule::new("TIMESTAMP", TypeFamily::TimestampTz),
    TypeRule::new("DATETIME", TypeFamily::Timestamp),
    TypeRule::new("GEOGRAPHY", TypeFamily::Unknown(TypeClass::Other)),
    TypeRule::new("STRUCT", TypeFamily::Unknown(TypeClass::Other)),
    TypeRule::new("ARRAY", TypeFamily::Unknown(TypeClass::Other)),
];

const TERADATA_TYPES: &[TypeRule] = &[
    TypeRule::new("BYTEINT", TypeFamily::Int8),
    TypeRule::new("NUMBER", TypeFamily::Decimal),
    TypeRule::new("BYTE", TypeFamily::Binary),
    TypeRule::new("VARBYTE", TypeFamily::Varbinary),
    TypeRule::new("LONG VARCHAR", TypeFamily::Varchar),
    TypeRule::new("PERIOD", TypeFamily::Unknown(TypeClass::Temporal)),
];

const INFORMATION_SCHEMA_LIST: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema = {schema} ORDER BY table_name";

static PROFILES: [DialectProfile; 7] = [
    DialectProfile {
        dialect: Dialect::Ansi,
        batch_separator: None,
        bracket_identifiers: false,
        type_rules: &[],
        exact_widths: true,
        integers_as_numbers: false,
        primary_index: false,
        show_create: None,
        list_objects: INFORMATION_SCHEMA_LIST,
        describe_columns: None,
        describe_constraints: None,
        view_definition: None,
    },
    DialectProfile {
        dialect: Dialect::Postgres,
        batch_separator: None,
        bracket_identifiers: false,
        type_rules: POSTGRES_TYPES,
        exact_widths: true,
        integers_as_numbers: false,
        primary_index: false,
        show_create: None,
        list_objects: "SELECT table_name::text, table_type::text FROM information_schema.tables \
             WHERE table_schema = {schema} \
             AND table_type IN ('BASE TABLE', 'VIEW') ORDER BY table_name",
        describe_columns: Some(
            "SELECT column_name::text, data_type::text, character_maximum_length::int, \
             numeric_precision::int, numeric_scale::int, datetime_precision::int, \
             is_nullable::text, column_default::text, collation_name::text, udt_name::text \
             FROM information_schema.columns \
             WHERE table_schema = {schema} AND table_name = {name} ORDER BY ordinal_position",
        ),
        describe_constraints: Some(
            "SELECT tc.constraint_name::text, tc.constraint_type::text, kcu.column_name::text, \
             ccu.table_schema::text, ccu.table_name::text, ccu.column_name::text \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
             ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             LEFT JOIN information_schema.constraint_column_usage ccu \
             ON tc.constraint_type = 'FOREIGN KEY' AND tc.constraint_name = ccu.constraint_name \
             WHERE tc.table_schema = {schema} AND tc.table_name = {name} \
             AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY') \
             ORDER BY tc.constraint_name, kcu.ordinal_position",
        ),
        view_definition: Some("SELECT pg_get_viewdef(to_regclass({qualified}), true)"),
    },
    DialectProfile {
        dialect: Dialect::MySql,
        batch_separator: None,
        bracket_identifiers: false,
        type_rules: MYSQL_TYPES,
        exact_widths: true,
        integers_as_numbers: false,
        primary_index: false,
        show_create: Some("SHOW CREATE {kind} {object}"),
        list_objects: INFORMATION_SCHEMA_LIST,
        describe_columns: None,
        describe_constraints: None,
        view_definition: None,
    },
    DialectProfile {
        dialect: Dialect::MsSql,
        batch_separator: Some("GO"),
        bracket_identifiers: true,
        type_rules: MSSQL_TYPES,
        exact_widths: true,
        integers_as_numbers: false,
        primary_index: false,
        show_create: Some("SELECT OBJECT_DEFINITION(OBJECT_ID({qualified}))"),
        list_objects: INFORMATION_SCHEMA_LIST,
        describe_columns: None,
        describe_constraints: None,
        view_definition: None,
    },
    DialectProfile {
        dialect: Dialect::Snowflake,
        batch_separator: None,
        bracket_identifiers: false,
        type_rules: SNOWFLAKE_TYPES,
        exact_widths: false,
        integers_as_numbers: true,
        primary_index: false,
        show_create: Some("SELECT GET_DDL('{kind}', {qualified})"),
        list_objects: INFORMATION_SCHEMA_LIST,
        describe_columns: None,
        describe_constraints: None,
        view_definition: None,
    },
    DialectProfile {
        dialect: Dialect::BigQuery,
        batch_separator: None,
        bracket_identifiers: false,
        type_rules: BIGQUERY_TYPES,
        exact_widths: false,
        integers_as_numbers: false,
        primary_index: false,
        show_create: Some(
            "SELECT ddl FROM INFORMATION_SCHEMA.TABLES \
             WHERE table_schema = {schema} AND table_name = {name}",
        ),
        list_objects: INFORMATION_SCHEMA_LIST,
        describe_columns: None,
        describe_constraints: None,
        view_definition: None,
    },
    DialectProfile {
        dialect: Dialect::Teradata,
        batch_separator: None,
        bracket_identifiers: false,
        type_rules: TERADATA_TYPES,
        exact_widths: true,
        integers_as_numbers: false,
        primary_index: true,
        show_create: Some("SHOW {kind} {object}"),
        list_objects: "SELECT TRIM(TableName) FROM DBC.TablesV \
             WHERE DatabaseName = {schema} AND TableKind IN ('T', 'V') ORDER BY 1",
        describe_columns: None,
        describe_constraints: None,
        view_definition: None,
    },
];

/// Capability row for a dialect
pub fn profile(dialect: Dialect) -> &'static DialectProfile {
    PROFILES
        .iter()
        .find(|p| p.dialect == dialect)
        .unwrap_or(&PROFILES[0])
}

impl DialectProfile {
    /// Look up upper-cased type words, dialect rules first
    pub fn type_rule(&self, words: &str) -> Option<&'static TypeRule> {
        self.type_rules
            .iter()
            .chain(ANSI_TYPES.iter())
            .find(|rule| rule.name == words)
    }
}

/// Fill a query template
///
/// `{schema}`, `{name}` and `{qualified}` become quoted string literals,
/// `{object}` the dotted identifier and `{kind}` the object keyword.
pub fn render_query(template: &str, object: &ObjectName, kind: ObjectKind) -> String {
    let schema = object.schema().unwrap_or("");
    let qualified = object.short().to_string();

    template
        .replace("{schema}", &quote_literal(schema))
        .replace("{name}", &quote_literal(object.name()))
        .replace("{qualified}", &quote_literal(&qualified))
        .replace("{object}", &qualified)
        .replace("{kind}", &kind.to_string())
}

/// Fill a listing template for one schema
pub fn render_list_query(template: &str, schema: &str) -> String {
    template.replace("{schema}", &quote_literal(schema))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
