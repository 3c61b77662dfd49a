//! File sinks for finished reports

use ddlcompare_core::{DimensionSummary, Report, ReportRow, ReportSink, RunMode, SinkError};
use std::path::PathBuf;

/// Pretty-printed report.json
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonFileSink {
    fn write(&self, report: &Report) -> Result<(), SinkError> {
        report.save_to_file(&self.path)
    }
}

/// Human-readable Markdown rendering of a report
pub struct MarkdownFileSink {
    path: PathBuf,
}

impl MarkdownFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for MarkdownFileSink {
    fn write(&self, report: &Report) -> Result<(), SinkError> {
        std::fs::write(&self.path, render_markdown(report))?;
        Ok(())
    }
}

fn cell(summary: Option<DimensionSummary>) -> &'static str {
    match summary {
        Some(DimensionSummary::Matched) => "✓",
        Some(DimensionSummary::Mismatched) => "✗",
        None => "-",
    }
}

fn table_row(row: &ReportRow) -> String {
    format!(
        "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
        row.object_name,
        row.object_kind,
        cell(row.columns),
        cell(row.data_type),
        cell(row.nullability),
        cell(row.default),
        cell(row.collation),
        cell(row.constraints),
        row.status,
        row.comment.replace('|', "\\|"),
    )
}

/// Render the report as Markdown
pub fn render_markdown(report: &Report) -> String {
    let mut md = String::new();

    let title = match report.mode {
        RunMode::Compare => "DDL Comparison Report",
        RunMode::Extract => "DDL Extraction Report",
    };
    md.push_str(&format!("# {}\n\n", title));
    md.push_str(&format!("**Version:** {}\n\n", report.version));
    md.push_str(&format!("**Run:** {}\n\n", report.run_id));
    md.push_str(&format!("**Timestamp:** {}\n\n", report.timestamp));
    md.push_str(&format!("**Source:** {}\n\n", report.source));
    if !report.targets.is_empty() {
        md.push_str(&format!("**Targets:** {}\n\n", report.targets.join(", ")));
    }

    let summary = &report.summary;
    md.push_str("## Summary\n\n");
    md.push_str(&format!("- Objects: {}\n", summary.total));
    match report.mode {
        RunMode::Compare => {
            md.push_str(&format!("- Matched: {}\n", summary.matched));
            md.push_str(&format!("- Not matched: {}\n", summary.not_matched));
            md.push_str(&format!("- Not available in source: {}\n", summary.not_available_in_source));
            md.push_str(&format!("- Not available in target: {}\n", summary.not_available_in_target));
        }
        RunMode::Extract => {
            md.push_str(&format!("- Extracted: {}\n", summary.extracted));
            md.push_str(&format!("- Not available in source: {}\n", summary.not_available_in_source));
        }
    }
    md.push_str(&format!("- Failed: {}\n\n", summary.failed));

    if !report.has_problems() {
        md.push_str("✅ **No issues found!**\n\n");
    }

    for group in &report.schemas {
        let schema = if group.schema.is_empty() { "(no schema)" } else { group.schema.as_str() };
        md.push_str(&format!("## {}\n\n", schema));
        md.push_str("| Object | Kind | Columns | Type | Nullability | Default | Collation | Constraints | Status | Comment |\n");
        md.push_str("|---|---|---|---|---|---|---|---|---|---|\n");
        for row in &group.rows {
            md.push_str(&table_row(row));
        }
        md.push('\n');
    }

    if !report.extracted.is_empty() {
        md.push_str("## Extracted definitions\n\n");
        for definition in &report.extracted {
            md.push_str(&format!("### {}\n\n", definition.object));
            for dependency in &definition.dependency_definitions {
                md.push_str(&format!("```sql\n{};\n```\n\n", dependency.text.trim_end()));
            }
            md.push_str(&format!("```sql\n{};\n```\n\n", definition.ddl.trim_end()));
            for unresolved in &definition.unresolved {
                md.push_str(&format!("- ⚠️ unresolved {}\n", unresolved));
            }
            if !definition.unresolved.is_empty() {
                md.push('\n');
            }
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddlcompare_core::{ExtractedDefinition, ObjectKind, ObjectName, RowStatus};
    use pretty_assertions::assert_eq;

    fn sample_report() -> Report {
        let mut report = Report::new("run-1", RunMode::Compare, "dev", vec!["prod".into()]);
        let mut row = ReportRow::new(
            &ObjectName::parse("sales.customers"),
            ObjectKind::Table,
            RowStatus::NotMatched,
            "column 'name' length (50 vs 40)",
        );
        row.data_type = Some(DimensionSummary::Mismatched);
        row.nullability = Some(DimensionSummary::Matched);
        report.set_rows(vec![row]);
        report
    }

    #[test]
    fn test_json_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = sample_report();

        JsonFileSink::new(&path).write(&report).unwrap();
        let loaded: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_markdown_rows() {
        let md = render_markdown(&sample_report());
        assert!(md.starts_with("# DDL Comparison Report"));
        assert!(md.contains("## sales"));
        assert!(md.contains(
            "| customers | TABLE | - | ✗ | ✓ | - | - | - | NOT_MATCHED | column 'name' length (50 vs 40) |"
        ));
        assert!(!md.contains("No issues found"));
    }

    #[test]
    fn test_markdown_extraction() {
        let mut report = Report::new("run-2", RunMode::Extract, "dev", Vec::new());
        report.set_rows(vec![ReportRow::new(
            &ObjectName::parse("s.v"),
            ObjectKind::View,
            RowStatus::Extracted,
            "0 dependencies",
        )]);
        report.extracted.push(ExtractedDefinition {
            object: ObjectName::parse("s.v"),
            kind: ObjectKind::View,
            ddl: "CREATE VIEW s.v AS SELECT 1".to_string(),
            dependencies: Vec::new(),
            dependency_definitions: Vec::new(),
            unresolved: vec!["s.gone: not found".to_string()],
        });

        let md = render_markdown(&report);
        assert!(md.contains("- Extracted: 1"));
        assert!(md.contains("```sql\nCREATE VIEW s.v AS SELECT 1;\n```"));
        assert!(md.contains("unresolved s.gone: not found"));
    }

    #[test]
    fn test_markdown_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        MarkdownFileSink::new(&path).write(&sample_report()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("DDL Comparison Report"));
    }
}
