//! Report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::schema::{ObjectKind, ObjectName, RawStatement};
use crate::status::{
    ColumnComparison, ColumnStatus, ComparisonResult, ConstraintStatus, DimensionStatus, OverallStatus,
};
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What a run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Compare source objects against targets
    Compare,

    /// Extract source definitions with their dependency closure
    Extract,
}

/// Status of one report row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    Matched,
    NotMatched,
    NotAvailableInSource,
    NotAvailableInTarget,
    Failed,
    /// Extraction run: definition and dependencies pulled successfully
    Extracted,
}

impl From<OverallStatus> for RowStatus {
    fn from(status: OverallStatus) -> Self {
        match status {
            OverallStatus::Matched => Self::Matched,
            OverallStatus::NotMatched => Self::NotMatched,
            OverallStatus::NotAvailableInSource => Self::NotAvailableInSource,
            OverallStatus::NotAvailableInTarget => Self::NotAvailableInTarget,
            OverallStatus::Failed => Self::Failed,
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Matched => "MATCHED",
            Self::NotMatched => "NOT_MATCHED",
            Self::NotAvailableInSource => "NOT_AVAILABLE_IN_SOURCE",
            Self::NotAvailableInTarget => "NOT_AVAILABLE_IN_TARGET",
            Self::Failed => "FAILED",
            Self::Extracted => "EXTRACTED",
        };
        write!(f, "{}", s)
    }
}

/// Summary of one dimension across all columns of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionSummary {
    Matched,
    Mismatched,
}

impl DimensionSummary {
    fn from_flag(mismatched: bool) -> Self {
        if mismatched {
            Self::Mismatched
        } else {
            Self::Matched
        }
    }
}

/// One row of the report: one compared or extracted object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Schema of the object (empty when unqualified)
    pub schema: String,

    /// Object name without schema
    pub object_name: String,

    /// Table or view
    pub object_kind: ObjectKind,

    /// Column sets equal (tables that were compared only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<DimensionSummary>,

    /// Column types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DimensionSummary>,

    /// Nullability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullability: Option<DimensionSummary>,

    /// Default expressions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DimensionSummary>,

    /// Collations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<DimensionSummary>,

    /// Constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<DimensionSummary>,

    /// Overall status
    pub status: RowStatus,

    /// First N mismatches, `; `-separated
    pub comment: String,
}

impl ReportRow {
    /// Bare row with no dimension columns
    pub fn new(object: &ObjectName, kind: ObjectKind, status: RowStatus, comment: impl Into<String>) -> Self {
        Self {
            schema: object.schema().unwrap_or_default().to_string(),
            object_name: object.name().to_string(),
            object_kind: kind,
            columns: None,
            data_type: None,
            nullability: None,
            default: None,
            collation: None,
            constraints: None,
            status,
            comment: comment.into(),
        }
    }

    /// Row for a comparison result
    ///
    /// Dimension columns are only filled for tables, from the pairs whose
    /// attributes were actually compared; pairs with a missing side or a kind
    /// mismatch do not contribute.
    pub fn from_comparison(result: &ComparisonResult, comment_limit: usize) -> Self {
        let comment = result.mismatch_notes(comment_limit).join("; ");
        let mut row = Self::new(&result.object, result.kind, result.status.into(), comment);

        if result.kind != ObjectKind::Table || result.status == OverallStatus::Failed {
            return row;
        }
        let compared: Vec<_> = result
            .pairs
            .iter()
            .filter(|p| {
                matches!(p.status, OverallStatus::Matched | OverallStatus::NotMatched) && p.kind_mismatch.is_none()
            })
            .collect();
        if compared.is_empty() {
            return row;
        }

        let all_columns = || compared.iter().flat_map(|p| p.columns.iter());
        let dimension_mismatch = |pick: fn(&ColumnComparison) -> Option<&DimensionStatus>| {
            all_columns().any(|c| pick(c).map(|d| !d.is_match()).unwrap_or(false))
        };

        row.columns = Some(DimensionSummary::from_flag(all_columns().any(|c| {
            matches!(c.status, ColumnStatus::MissingInSource | ColumnStatus::MissingInTarget)
        })));
        row.data_type = Some(DimensionSummary::from_flag(dimension_mismatch(|c| c.data_type.as_ref())));
        row.nullability = Some(DimensionSummary::from_flag(dimension_mismatch(|c| c.nullability.as_ref())));
        row.default = Some(DimensionSummary::from_flag(dimension_mismatch(|c| c.default.as_ref())));
        row.collation = Some(DimensionSummary::from_flag(dimension_mismatch(|c| c.collation.as_ref())));
        row.constraints = Some(DimensionSummary::from_flag(
            compared
                .iter()
                .flat_map(|p| p.constraints.iter())
                .any(|c| c.status != ConstraintStatus::Matched),
        ));

        row
    }

    /// Sort key: (schema, object_name)
    pub fn sort_key(&self) -> (&str, &str) {
        (self.schema.as_str(), self.object_name.as_str())
    }
}

/// Rows of one schema, sorted by object name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaGroup {
    /// Schema name
    pub schema: String,

    /// Rows in this schema
    pub rows: Vec<ReportRow>,
}

/// Definition pulled in extraction mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDefinition {
    /// Root object
    pub object: ObjectName,

    /// Root object kind
    pub kind: ObjectKind,

    /// Root definition text
    pub ddl: String,

    /// Resolved dependency closure (excluding the root)
    pub dependencies: Vec<ObjectName>,

    /// Definitions of the dependencies, dependencies first
    pub dependency_definitions: Vec<RawStatement>,

    /// Dependencies that could not be resolved, with the reason
    pub unresolved: Vec<String>,
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of rows
    pub total: usize,

    pub matched: usize,

    pub not_matched: usize,

    pub not_available_in_source: usize,

    pub not_available_in_target: usize,

    pub failed: usize,

    pub extracted: usize,
}

impl ReportSummary {
    /// Count one row
    pub fn record(&mut self, status: RowStatus) {
        self.total += 1;
        match status {
            RowStatus::Matched => self.matched += 1,
            RowStatus::NotMatched => self.not_matched += 1,
            RowStatus::NotAvailableInSource => self.not_available_in_source += 1,
            RowStatus::NotAvailableInTarget => self.not_available_in_target += 1,
            RowStatus::Failed => self.failed += 1,
            RowStatus::Extracted => self.extracted += 1,
        }
    }

    /// Rows that are neither matched nor extracted
    pub fn problems(&self) -> usize {
        self.not_matched + self.not_available_in_source + self.not_available_in_target + self.failed
    }
}

/// Run report (report.json v1)
///
/// This is the stable output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Run identifier
    pub run_id: String,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Compare or extract
    pub mode: RunMode,

    /// Source label
    pub source: String,

    /// Target labels (compare mode)
    pub targets: Vec<String>,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Rows grouped by schema, sorted by (schema, object_name)
    pub schemas: Vec<SchemaGroup>,

    /// Extracted definitions (extract mode)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extracted: Vec<ExtractedDefinition>,

    /// Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Report {
    /// Create an empty report
    pub fn new(run_id: impl Into<String>, mode: RunMode, source: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            mode,
            source: source.into(),
            targets,
            summary: ReportSummary::default(),
            schemas: Vec::new(),
            extracted: Vec::new(),
            metadata: None,
        }
    }

    /// Replace the rows: sorts by (schema, object_name), groups, and recounts
    pub fn set_rows(&mut self, mut rows: Vec<ReportRow>) {
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut summary = ReportSummary::default();
        let mut schemas: Vec<SchemaGroup> = Vec::new();
        for row in rows {
            summary.record(row.status);
            match schemas.last_mut() {
                Some(group) if group.schema == row.schema => group.rows.push(row),
                _ => schemas.push(SchemaGroup {
                    schema: row.schema.clone(),
                    rows: vec![row],
                }),
            }
        }

        self.summary = summary;
        self.schemas = schemas;
    }

    /// All rows in report order
    pub fn rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.schemas.iter().flat_map(|g| g.rows.iter())
    }

    /// Check if any row is not matched, unavailable or failed
    pub fn has_problems(&self) -> bool {
        self.summary.problems() > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), SinkError> {
        let json = self.to_json().map_err(|e| SinkError::Serialize(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Consumer of finished reports (file writer, notifier, ...)
pub trait ReportSink {
    /// Write or forward the report
    fn write(&self, report: &Report) -> Result<(), SinkError>;
}

/// Report sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
