//! ddlcompare core
//!
//! Dialect-independent schema model shared by every other crate:
//! canonical types, schema objects, comparison statuses, the report
//! format and the run configuration.
//! Status names serialize as stable strings - they are part of the report format.

pub mod config;
pub mod dialect;
pub mod report;
pub mod schema;
pub mod status;

pub use config::{AllowlistRules, CompareConfig, Config, ConfigError, DefaultRule, RunConfig, TypeMatching};
pub use dialect::Dialect;
pub use report::{
    DimensionSummary, ExtractedDefinition, Report, ReportRow, ReportSink, ReportSummary,
    ReportVersion, RowStatus, RunMode, SchemaGroup, SinkError,
};
pub use schema::{
    CanonicalType, ColumnSpec, ConstraintKind, ConstraintSpec, ObjectKind, ObjectName,
    RawStatement, SchemaObject, TypeClass, TypeFamily,
};
pub use status::{
    ColumnComparison, ColumnStatus, ComparisonResult, ConstraintComparison, ConstraintStatus,
    DimensionStatus, Mismatch, OverallStatus, PairComparison,
};
