//! Outcome of a diff run

use crate::error::Result;
use crate::resource::{DataResource, MemoryTable};
use crate::structure::RelationDef;
use crate::value::{display_optional, DataType, Value};
use serde::Serialize;

/// Counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffState {
    /// Rows consumed from the source
    pub source_record_id: u64,
    /// Rows consumed from the target
    pub target_record_id: u64,
    pub change_counter: u64,
    /// Source rows without an identical counterpart (deletions and value changes)
    pub deletion_counter: u64,
    /// Classified steps, unchanged ones included
    pub record_diff_counter: u64,
}

impl DiffState {
    pub fn record_count(&self) -> u64 {
        self.source_record_id.max(self.target_record_id)
    }
}

/// Final counters plus the materialized report, if one was requested
#[derive(Debug)]
pub struct DiffResult {
    state: DiffState,
    source_name: String,
    target_name: String,
    driver_columns: Vec<String>,
    report: Option<MemoryTable>,
}

/// Serializable digest of a [`DiffResult`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffSummary {
    pub source: String,
    pub target: String,
    pub equal: bool,
    pub record_count: u64,
    pub change_count: u64,
    pub deletion_count: u64,
    pub step_count: u64,
    pub driver_columns: Vec<String>,
    pub report_name: Option<String>,
    pub report_rows: Option<u64>,
    /// blake3 hash of the rendered report rows
    pub report_digest: Option<String>,
}

impl DiffResult {
    pub fn new(
        state: DiffState,
        source_name: impl Into<String>,
        target_name: impl Into<String>,
        driver_columns: Vec<String>,
        report: Option<MemoryTable>,
    ) -> Self {
        Self {
            state,
            source_name: source_name.into(),
            target_name: target_name.into(),
            driver_columns,
            report,
        }
    }

    pub fn state(&self) -> &DiffState {
        &self.state
    }

    pub fn are_equal(&self) -> bool {
        self.state.change_counter == 0
    }

    pub fn change_count(&self) -> u64 {
        self.state.change_counter
    }

    pub fn deletion_count(&self) -> u64 {
        self.state.deletion_counter
    }

    pub fn record_count(&self) -> u64 {
        self.state.record_count()
    }

    pub fn step_count(&self) -> u64 {
        self.state.record_diff_counter
    }

    /// Every source record is found unchanged in the target
    pub fn is_source_contained_in_target(&self) -> bool {
        self.state.deletion_counter == 0
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn driver_columns(&self) -> &[String] {
        &self.driver_columns
    }

    pub fn report(&self) -> Option<&MemoryTable> {
        self.report.as_ref()
    }

    pub fn into_report(self) -> Option<MemoryTable> {
        self.report
    }

    /// One-row table: from, to, equals, record_count, change_count
    pub fn summary_table(&self) -> Result<MemoryTable> {
        let relation = RelationDef::new()
            .with_column("from", DataType::Text)
            .with_column("to", DataType::Text)
            .with_column("equals", DataType::Boolean)
            .with_column("record_count", DataType::Integer)
            .with_column("change_count", DataType::Integer);
        let mut table = MemoryTable::from_rows(
            "diff_summary",
            relation,
            vec![vec![
                Some(Value::from(self.source_name.as_str())),
                Some(Value::from(self.target_name.as_str())),
                Some(Value::Boolean(self.are_equal())),
                Some(Value::from(self.record_count())),
                Some(Value::from(self.change_count())),
            ]],
        )?;
        table.set_comment(if self.are_equal() {
            "The data resources are equal."
        } else {
            "The data resources are not equal."
        });
        Ok(table)
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            source: self.source_name.clone(),
            target: self.target_name.clone(),
            equal: self.are_equal(),
            record_count: self.record_count(),
            change_count: self.change_count(),
            deletion_count: self.deletion_count(),
            step_count: self.step_count(),
            driver_columns: self.driver_columns.clone(),
            report_name: self.report.as_ref().map(|r| r.name().to_string()),
            report_rows: self.report.as_ref().map(|r| r.rows().len() as u64),
            report_digest: self.report.as_ref().map(report_digest),
        }
    }
}

/// Hash of the header and the tab-separated rendered rows
pub fn report_digest(report: &MemoryTable) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(report.relation_def().column_names().join("\t").as_bytes());
    hasher.update(b"\n");
    for row in report.rows() {
        let line: Vec<String> = row.iter().map(|v| display_optional(v.as_ref())).collect();
        hasher.update(line.join("\t").as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
