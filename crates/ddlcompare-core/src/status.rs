//! Comparison statuses
//!
//! Status names serialize as SCREAMING_SNAKE_CASE strings and are part of
//! the report format. Do not rename variants.

use crate::schema::{ConstraintKind, ObjectKind, ObjectName};
use serde::{Deserialize, Serialize};

/// A single differing aspect, seen from source and target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// What differs (`family`, `length`, `nullable`, `default`, ...)
    pub aspect: String,

    /// Source-side value
    pub source: String,

    /// Target-side value
    pub target: String,
}

impl Mismatch {
    pub fn new(aspect: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            aspect: aspect.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} vs {})", self.aspect, self.source, self.target)
    }
}

/// Outcome of comparing one dimension of a shared column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionStatus {
    Matched,
    Mismatched(Mismatch),
    /// Values differ in a way the normalization rules cannot settle
    Ambiguous(Mismatch),
    /// Dimension disabled by configuration
    NotCompared,
}

impl DimensionStatus {
    /// True unless the dimension reports a difference
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched | Self::NotCompared)
    }

    /// The mismatch detail, if any
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Self::Mismatched(m) | Self::Ambiguous(m) => Some(m),
            _ => None,
        }
    }
}

/// Column-level status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnStatus {
    Matched,
    Mismatched,
    MissingInSource,
    MissingInTarget,
}

/// Comparison of one column name across a source/target pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnComparison {
    /// Column name
    pub name: String,

    /// Column-level status
    pub status: ColumnStatus,

    /// Type dimension (absent for one-sided columns)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DimensionStatus>,

    /// Nullability dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullability: Option<DimensionStatus>,

    /// Default expression dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DimensionStatus>,

    /// Collation dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<DimensionStatus>,
}

impl ColumnComparison {
    /// Column only present on the target side
    pub fn missing_in_source(name: impl Into<String>) -> Self {
        Self::one_sided(name, ColumnStatus::MissingInSource)
    }

    /// Column only present on the source side
    pub fn missing_in_target(name: impl Into<String>) -> Self {
        Self::one_sided(name, ColumnStatus::MissingInTarget)
    }

    fn one_sided(name: impl Into<String>, status: ColumnStatus) -> Self {
        Self {
            name: name.into(),
            status,
            data_type: None,
            nullability: None,
            default: None,
            collation: None,
        }
    }

    /// Column present on both sides; status derives from the dimensions
    pub fn compared(
        name: impl Into<String>,
        data_type: DimensionStatus,
        nullability: DimensionStatus,
        default: DimensionStatus,
        collation: DimensionStatus,
    ) -> Self {
        let all_match = [&data_type, &nullability, &default, &collation]
            .iter()
            .all(|d| d.is_match());

        Self {
            name: name.into(),
            status: if all_match {
                ColumnStatus::Matched
            } else {
                ColumnStatus::Mismatched
            },
            data_type: Some(data_type),
            nullability: Some(nullability),
            default: Some(default),
            collation: Some(collation),
        }
    }

    /// Dimensions paired with their report names
    pub fn dimensions(&self) -> [(&'static str, Option<&DimensionStatus>); 4] {
        [
            ("type", self.data_type.as_ref()),
            ("nullability", self.nullability.as_ref()),
            ("default", self.default.as_ref()),
            ("collation", self.collation.as_ref()),
        ]
    }
}

/// Constraint-level status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintStatus {
    Matched,
    Mismatched(String),
    MissingInSource,
    MissingInTarget,
}

/// Comparison of one constraint across a source/target pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintComparison {
    /// Constraint kind on the side it was found
    pub kind: ConstraintKind,

    /// Constrained columns
    pub columns: Vec<String>,

    /// Status
    pub status: ConstraintStatus,
}

/// Overall status of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Matched,
    NotMatched,
    NotAvailableInSource,
    NotAvailableInTarget,
    Failed,
}

impl OverallStatus {
    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "MATCHED",
            Self::NotMatched => "NOT_MATCHED",
            Self::NotAvailableInSource => "NOT_AVAILABLE_IN_SOURCE",
            Self::NotAvailableInTarget => "NOT_AVAILABLE_IN_TARGET",
            Self::Failed => "FAILED",
        }
    }

    /// Rank used when folding several pair statuses into one
    fn severity(&self) -> u8 {
        match self {
            Self::Matched => 0,
            Self::NotMatched => 1,
            Self::NotAvailableInTarget => 2,
            Self::NotAvailableInSource => 3,
            Self::Failed => 4,
        }
    }

    /// The more severe of two statuses
    pub fn worst(self, other: OverallStatus) -> OverallStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison of the source object against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairComparison {
    /// Target label
    pub target: String,

    /// Status of this pair
    pub status: OverallStatus,

    /// Set when one side is a table and the other a view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind_mismatch: Option<Mismatch>,

    /// Per-column comparisons (tables only)
    pub columns: Vec<ColumnComparison>,

    /// Per-constraint comparisons (tables only)
    pub constraints: Vec<ConstraintComparison>,

    /// Normalized body comparison (views only, when enabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_body: Option<DimensionStatus>,
}

impl PairComparison {
    /// Pair where one side is absent: no attribute-level comparison
    pub fn unavailable(target: impl Into<String>, status: OverallStatus) -> Self {
        Self {
            target: target.into(),
            status,
            kind_mismatch: None,
            columns: Vec::new(),
            constraints: Vec::new(),
            view_body: None,
        }
    }

    /// Human-readable mismatch notes for this pair
    pub fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();

        match self.status {
            OverallStatus::NotAvailableInSource => notes.push("object not available in source".to_string()),
            OverallStatus::NotAvailableInTarget => notes.push("object not available in target".to_string()),
            _ => {}
        }

        if let Some(kind) = &self.kind_mismatch {
            notes.push(format!("object {}", kind));
        }

        for column in &self.columns {
            match column.status {
                ColumnStatus::MissingInSource => {
                    notes.push(format!("column '{}' missing in source", column.name))
                }
                ColumnStatus::MissingInTarget => {
                    notes.push(format!("column '{}' missing in target", column.name))
                }
                ColumnStatus::Mismatched => {
                    for (_, dimension) in column.dimensions() {
                        match dimension {
                            Some(DimensionStatus::Mismatched(m)) => {
                                notes.push(format!("column '{}' {}", column.name, m))
                            }
                            Some(DimensionStatus::Ambiguous(m)) => {
                                notes.push(format!("column '{}' ambiguous {}", column.name, m))
                            }
                            _ => {}
                        }
                    }
                }
                ColumnStatus::Matched => {}
            }
        }

        for constraint in &self.constraints {
            let label = format!("{} ({})", constraint.kind, constraint.columns.join(", "));
            match &constraint.status {
                ConstraintStatus::Matched => {}
                ConstraintStatus::Mismatched(detail) => {
                    notes.push(format!("constraint {} mismatched: {}", label, detail))
                }
                ConstraintStatus::MissingInSource => {
                    notes.push(format!("constraint {} missing in source", label))
                }
                ConstraintStatus::MissingInTarget => {
                    notes.push(format!("constraint {} missing in target", label))
                }
            }
        }

        if let Some(body) = self.view_body.as_ref().and_then(|b| b.mismatch()) {
            notes.push(format!("view {}", body.aspect));
        }

        notes
    }
}

/// Result of comparing one object identity across a source and its targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Object being compared (source-side name)
    pub object: ObjectName,

    /// Object kind (source side when present)
    pub kind: ObjectKind,

    /// Overall status: MATCHED only if every pair matched
    pub status: OverallStatus,

    /// One entry per target
    pub pairs: Vec<PairComparison>,

    /// Failure message (FAILED only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComparisonResult {
    /// Build from pair comparisons, folding their statuses
    ///
    /// With no pairs there is nothing to fold, so the result is FAILED.
    pub fn from_pairs(object: ObjectName, kind: ObjectKind, pairs: Vec<PairComparison>) -> Self {
        if pairs.is_empty() {
            return Self::failed(object, kind, "no targets to compare against");
        }

        let status = pairs
            .iter()
            .map(|p| p.status)
            .fold(OverallStatus::Matched, OverallStatus::worst);

        Self {
            object,
            kind,
            status,
            pairs,
            error: None,
        }
    }

    /// A result for an object whose pipeline failed
    pub fn failed(object: ObjectName, kind: ObjectKind, message: impl Into<String>) -> Self {
        Self {
            object,
            kind,
            status: OverallStatus::Failed,
            pairs: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// First `limit` mismatch notes across all pairs
    ///
    /// Notes are prefixed with the target label when there are several targets.
    pub fn mismatch_notes(&self, limit: usize) -> Vec<String> {
        if let Some(error) = &self.error {
            return vec![error.clone()];
        }

        let prefix = self.pairs.len() > 1;
        self.pairs
            .iter()
            .flat_map(|pair| {
                pair.notes().into_iter().map(move |note| {
                    if prefix {
                        format!("[{}] {}", pair.target, note)
                    } else {
                        note
                    }
                })
            })
            .take(limit)
            .collect()
    }
}
