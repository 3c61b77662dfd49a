//! Report aggregation
//!
//! Turns pipeline outcomes into report rows. Rows are sorted and grouped by
//! schema when the report is finished, so outcomes may arrive in any order.

use crate::pipeline::Outcome;
use ddlcompare_core::{ExtractedDefinition, ObjectKind, Report, ReportRow, RowStatus};

pub struct Aggregator {
    comment_limit: usize,
    rows: Vec<ReportRow>,
    extracted: Vec<ExtractedDefinition>,
}

impl Aggregator {
    pub fn new(comment_limit: usize) -> Self {
        Self {
            comment_limit,
            rows: Vec::new(),
            extracted: Vec::new(),
        }
    }

    /// Add one outcome; every outcome yields exactly one row
    pub fn record(&mut self, outcome: Outcome) {
        let row = match outcome {
            Outcome::Compared(result) => ReportRow::from_comparison(&result, self.comment_limit),
            Outcome::Extracted(definition) => {
                let row = ReportRow::new(
                    &definition.object,
                    definition.kind,
                    RowStatus::Extracted,
                    self.extraction_comment(&definition),
                );
                self.extracted.push(definition);
                row
            }
            // kind is unknown when the fetch itself failed
            Outcome::Failed { object, kind, message } => {
                ReportRow::new(&object, kind.unwrap_or(ObjectKind::Table), RowStatus::Failed, message)
            }
        };
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Move the rows and extracted definitions into `report`
    pub fn finish(mut self, mut report: Report) -> Report {
        self.extracted.sort_by(|a, b| a.object.cmp(&b.object));
        report.set_rows(self.rows);
        report.extracted = self.extracted;
        report
    }

    fn extraction_comment(&self, definition: &ExtractedDefinition) -> String {
        let count = definition.dependencies.len();
        let mut notes = vec![match count {
            1 => "1 dependency".to_string(),
            n => format!("{} dependencies", n),
        }];
        notes.extend(
            definition
                .unresolved
                .iter()
                .take(self.comment_limit)
                .map(|u| format!("unresolved {}", u)),
        );
        notes.join("; ")
    }
}
