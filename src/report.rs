//! Report accumulation
//!
//! The merge loop hands every classified step to a [`ReportAccumulator`].
//! The strategy is chosen once per run:
//!
//! - `None`: nothing is materialized, only the counters are kept
//! - `Unified`: one report row per record (two for a value change)
//! - `Cell`: one report row per reported cell

use crate::cell::{EqualityMode, EqualityStatus, RecordAlignment};
use crate::config::ResolvedOptions;
use crate::driver::DriverColumns;
use crate::error::{DiffError, Result};
use crate::resource::{DataResource, MemoryTable, Row, RowSink};
use crate::value::{display_optional, DataType, Value};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of the materialized report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStrategy {
    /// Counters only
    #[serde(alias = "summary")]
    None,
    #[default]
    Unified,
    Cell,
}

impl ReportStrategy {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "none" | "summary" => Ok(Self::None),
            "unified" | "record" => Ok(Self::Unified),
            "cell" => Ok(Self::Cell),
            _ => Err(format!(
                "Invalid report strategy: {}. Use 'unified', 'cell' or 'summary'",
                s
            )),
        }
    }
}

/// Whether unchanged rows and cells appear in the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportDensity {
    #[default]
    Dense,
    Sparse,
}

impl ReportDensity {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "dense" => Ok(Self::Dense),
            "sparse" => Ok(Self::Sparse),
            _ => Err(format!("Invalid report density: {}. Use 'dense' or 'sparse'", s)),
        }
    }
}

/// Metadata columns prepended to the unified report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffColumn {
    /// Report row sequence
    Id,
    /// Change number, shared by the two rows of a value change
    ChangeId,
    Status,
    Origin,
    /// Row sequence of the record in its own resource
    OriginId,
    /// Terminal highlight hints
    Colors,
}

impl DiffColumn {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "id" => Ok(Self::Id),
            "change_id" => Ok(Self::ChangeId),
            "status" => Ok(Self::Status),
            "origin" => Ok(Self::Origin),
            "origin_id" => Ok(Self::OriginId),
            "colors" | "color" => Ok(Self::Colors),
            _ => Err(format!(
                "Invalid diff column: {}. Use one of status, colors, id, change_id, origin, origin_id",
                s
            )),
        }
    }

    /// Parse a comma separated list
    pub fn parse_list(s: &str) -> std::result::Result<Vec<Self>, String> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::ChangeId => "change_id",
            Self::Status => "status",
            Self::Origin => "origin",
            Self::OriginId => "origin_id",
            Self::Colors => "colors",
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Id | Self::ChangeId | Self::OriginId => DataType::Integer,
            Self::Status | Self::Origin | Self::Colors => DataType::Text,
        }
    }
}

/// Side a report row was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueOrigin {
    Source,
    Target,
    Both,
}

impl ValueOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
            Self::Both => "both",
        }
    }
}

/// Classification of one merge step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// In the target only
    Add,
    /// In the source only
    Delete,
    /// Same record, different values
    Value,
    NoChange,
}

impl DiffStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Delete => "-",
            Self::Value => "~",
            Self::NoChange => "=",
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange)
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Highlight hint carried by the colors column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightColor {
    /// Deleted, from the source
    Red,
    /// Added, from the target
    Green,
    /// Same value, different representation
    Blue,
}

impl HighlightColor {
    pub fn letter(&self) -> char {
        match self {
            Self::Red => 'r',
            Self::Green => 'g',
            Self::Blue => 'b',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'r' => Some(Self::Red),
            'g' => Some(Self::Green),
            'b' => Some(Self::Blue),
            _ => None,
        }
    }

    fn for_origin(origin: ValueOrigin) -> Option<Self> {
        match origin {
            ValueOrigin::Source => Some(Self::Red),
            ValueOrigin::Target => Some(Self::Green),
            ValueOrigin::Both => None,
        }
    }
}

/// Decoded colors column: whole-row color or per-position colors
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColorHints {
    pub row: Option<HighlightColor>,
    /// 1-based report positions
    pub cells: Vec<(usize, HighlightColor)>,
}

impl ColorHints {
    /// Parse `r`, `g`, or a list such as `1g,2g,5b`
    pub fn parse(hint: &str) -> Self {
        let hint = hint.trim();
        let mut hints = Self::default();
        if hint.is_empty() {
            return hints;
        }
        if hint.len() == 1 {
            hints.row = hint.chars().next().and_then(HighlightColor::from_letter);
            return hints;
        }
        for part in hint.split(',') {
            let part = part.trim();
            let Some(letter) = part.chars().last() else {
                continue;
            };
            let digits = &part[..part.len() - letter.len_utf8()];
            if let (Ok(position), Some(color)) =
                (digits.parse::<usize>(), HighlightColor::from_letter(letter))
            {
                hints.cells.push((position, color));
            }
        }
        hints
    }

    pub fn color_at(&self, position: usize) -> Option<HighlightColor> {
        self.cells
            .iter()
            .find(|(p, _)| *p == position)
            .map(|(_, c)| *c)
            .or(self.row)
    }
}

/// Row sequence numbers attached to one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepIds {
    /// Set on changes only
    pub change_id: Option<u64>,
    pub source_row_id: u64,
    pub target_row_id: u64,
}

/// Report strategy selected for a run
#[derive(Debug)]
pub enum ReportAccumulator {
    None,
    Unified(UnifiedRecordReport),
    Cell(CellReport),
}

impl ReportAccumulator {
    pub fn new(
        options: &ResolvedOptions,
        source: &dyn DataResource,
        target: &dyn DataResource,
        drivers: &DriverColumns,
    ) -> Result<Self> {
        let accumulator = match options.report {
            ReportStrategy::None => Self::None,
            ReportStrategy::Unified => {
                Self::Unified(UnifiedRecordReport::new(options, source, target, drivers)?)
            }
            ReportStrategy::Cell => Self::Cell(CellReport::new(options, source, target)?),
        };
        debug!("Report strategy: {:?}", options.report);
        Ok(accumulator)
    }

    /// Record one classified step
    pub fn insert_result_record(
        &mut self,
        unit: &RecordAlignment<'_>,
        status: DiffStatus,
        ids: StepIds,
    ) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Unified(report) => report.insert_result_record(unit, status, ids),
            Self::Cell(report) => report.insert_result_record(unit, status, ids),
        }
    }

    /// The materialized report, `None` for the summary-only strategy
    pub fn finalize(self, equal: bool) -> Option<MemoryTable> {
        match self {
            Self::None => None,
            Self::Unified(report) => Some(report.finalize(equal)),
            Self::Cell(report) => Some(report.finalize(equal)),
        }
    }
}

fn new_report_table(options: &ResolvedOptions) -> MemoryTable {
    match &options.report_name {
        Some(name) => MemoryTable::new(name.clone()),
        None => MemoryTable::random(),
    }
}

fn report_comment(source: &str, target: &str, use_color: bool, equal: bool) -> String {
    let mut comment = format!(
        "Diff report between the source ({}) and the target ({}).\n",
        source, target
    );
    if use_color {
        comment.push_str("Colors: red = deleted (source), green = added (target), blue = same value with another representation.\n");
    }
    if equal {
        comment.push_str("The data resources are equal.");
    } else {
        comment.push_str("The data resources are not equal.");
    }
    comment
}

/// Record-grain report: metadata columns followed by the source columns
#[derive(Debug)]
pub struct UnifiedRecordReport {
    table: MemoryTable,
    columns: Vec<DiffColumn>,
    density: ReportDensity,
    mode: EqualityMode,
    use_color: bool,
    /// Row identity is not readable from the printed driver columns
    show_origin_id: bool,
    /// Every column is a driver column: value changes carry the row id
    status_with_row_id: bool,
    sequence: u64,
    source_name: String,
    target_name: String,
}

impl UnifiedRecordReport {
    pub fn new(
        options: &ResolvedOptions,
        source: &dyn DataResource,
        target: &dyn DataResource,
        drivers: &DriverColumns,
    ) -> Result<Self> {
        let mut table = new_report_table(options);
        let relation = source.relation_def();

        for column in &options.diff_columns {
            let name = format!("{}{}", options.column_prefix, column.name());
            if relation.column_by_name(&name).is_some() {
                return Err(DiffError::report(format!(
                    "The report column ({}) collides with a column of the source ({}). Set another column prefix.",
                    name,
                    source.name()
                )));
            }
            table.add_column(&name, column.data_type(), *column != DiffColumn::Status)?;
        }
        for column in relation.columns() {
            table.add_column(&column.name, column.data_type, true)?;
        }

        Ok(Self {
            table,
            columns: options.diff_columns.clone(),
            density: options.density,
            mode: options.equality,
            use_color: options.use_color,
            show_origin_id: !drivers.covers_all_columns(),
            status_with_row_id: drivers.covers_all_columns(),
            sequence: 0,
            source_name: source.name().to_string(),
            target_name: target.name().to_string(),
        })
    }

    pub fn insert_result_record(
        &mut self,
        unit: &RecordAlignment<'_>,
        status: DiffStatus,
        ids: StepIds,
    ) -> Result<()> {
        match status {
            DiffStatus::NoChange => {
                if self.density == ReportDensity::Sparse {
                    return Ok(());
                }
                self.insert(unit, "=".to_string(), ValueOrigin::Both, ids.source_row_id, None, false)
            }
            DiffStatus::Add => self.insert(
                unit,
                "+".to_string(),
                ValueOrigin::Target,
                ids.target_row_id,
                ids.change_id,
                false,
            ),
            DiffStatus::Delete => self.insert(
                unit,
                "-".to_string(),
                ValueOrigin::Source,
                ids.source_row_id,
                ids.change_id,
                false,
            ),
            DiffStatus::Value => {
                // The current state (target) comes first
                let change = ids.change_id.unwrap_or_default();
                let (added, deleted) = if self.status_with_row_id {
                    (
                        format!("+{} ({})", change, ids.target_row_id),
                        format!("-{} ({})", change, ids.source_row_id),
                    )
                } else {
                    (format!("+{}", change), format!("-{}", change))
                };
                self.insert(unit, added, ValueOrigin::Target, ids.target_row_id, ids.change_id, true)?;
                self.insert(unit, deleted, ValueOrigin::Source, ids.source_row_id, ids.change_id, true)
            }
        }
    }

    fn insert(
        &mut self,
        unit: &RecordAlignment<'_>,
        status: String,
        origin: ValueOrigin,
        origin_row_id: u64,
        change_id: Option<u64>,
        value_change: bool,
    ) -> Result<()> {
        self.sequence += 1;
        let sparse = value_change && self.density == ReportDensity::Sparse;
        let colors = self.colors(unit, origin, value_change);

        let mut row: Row = Vec::with_capacity(self.columns.len() + unit.cells().len());
        for column in &self.columns {
            row.push(match column {
                DiffColumn::Id => Some(Value::from(self.sequence)),
                DiffColumn::ChangeId => change_id.map(Value::from),
                DiffColumn::Status => Some(Value::Text(status.clone())),
                DiffColumn::Origin => Some(Value::from(origin.as_str())),
                DiffColumn::OriginId => self.show_origin_id.then(|| Value::from(origin_row_id)),
                DiffColumn::Colors => Some(Value::Text(colors.clone())),
            });
        }
        for cell in unit.cells() {
            if sparse && cell.is_equals(self.mode) {
                row.push(None);
                continue;
            }
            let value = match origin {
                ValueOrigin::Target => cell.target_value(),
                ValueOrigin::Source | ValueOrigin::Both => cell.source_value(),
            };
            row.push(value.cloned());
        }
        self.table.insert_row(row)
    }

    /// Colors hint for one report row
    fn colors(&self, unit: &RecordAlignment<'_>, origin: ValueOrigin, value_change: bool) -> String {
        let Some(origin_color) = HighlightColor::for_origin(origin) else {
            return String::new();
        };
        if !value_change {
            return origin_color.letter().to_string();
        }
        let mut hints = Vec::new();
        for (index, column) in self.columns.iter().enumerate() {
            if *column != DiffColumn::Colors {
                hints.push(format!("{}{}", index + 1, origin_color.letter()));
            }
        }
        let metadata_count = self.columns.len();
        for cell in unit.cells() {
            let color = match cell.status() {
                EqualityStatus::StrictEqual => continue,
                EqualityStatus::LossEqual => HighlightColor::Blue,
                EqualityStatus::NotEqual => origin_color,
            };
            hints.push(format!("{}{}", cell.position() + metadata_count, color.letter()));
        }
        hints.join(",")
    }

    pub fn finalize(mut self, equal: bool) -> MemoryTable {
        self.table.set_comment(report_comment(
            &self.source_name,
            &self.target_name,
            self.use_color,
            equal,
        ));
        self.table
    }
}

/// Cell-grain report: one row per reported cell
#[derive(Debug)]
pub struct CellReport {
    table: MemoryTable,
    column_names: Vec<String>,
    density: ReportDensity,
    mode: EqualityMode,
    use_color: bool,
    source_name: String,
    target_name: String,
}

const CELL_REPORT_COLUMNS: &[(&str, DataType)] = &[
    ("change_id", DataType::Integer),
    ("status", DataType::Text),
    ("key", DataType::Text),
    ("column", DataType::Text),
    ("source_value", DataType::Text),
    ("target_value", DataType::Text),
    ("equality", DataType::Text),
];

impl CellReport {
    pub fn new(options: &ResolvedOptions, source: &dyn DataResource, target: &dyn DataResource) -> Result<Self> {
        let mut table = new_report_table(options);
        for (name, data_type) in CELL_REPORT_COLUMNS {
            table.add_column(&format!("{}{}", options.column_prefix, name), *data_type, true)?;
        }
        Ok(Self {
            table,
            column_names: source
                .relation_def()
                .column_names()
                .into_iter()
                .map(String::from)
                .collect(),
            density: options.density,
            mode: options.equality,
            use_color: options.use_color,
            source_name: source.name().to_string(),
            target_name: target.name().to_string(),
        })
    }

    pub fn insert_result_record(
        &mut self,
        unit: &RecordAlignment<'_>,
        status: DiffStatus,
        ids: StepIds,
    ) -> Result<()> {
        let dense = self.density == ReportDensity::Dense;
        let key = unit.key_text();
        for cell in unit.cells() {
            let reported = match status {
                DiffStatus::Add | DiffStatus::Delete => true,
                DiffStatus::Value => dense || !cell.is_equals(self.mode),
                DiffStatus::NoChange => dense,
            };
            if !reported {
                continue;
            }
            let column = self
                .column_names
                .get(cell.position() - 1)
                .cloned()
                .unwrap_or_else(|| cell.position().to_string());
            let render = |value: Option<&Value>| value.map(|v| Value::Text(display_optional(Some(v))));
            self.table.insert_row(vec![
                ids.change_id.map(Value::from),
                Some(Value::from(status.symbol())),
                Some(Value::Text(key.clone())),
                Some(Value::Text(column)),
                render(cell.source_value()),
                render(cell.target_value()),
                Some(Value::from(cell.status().as_str())),
            ])?;
        }
        Ok(())
    }

    pub fn finalize(mut self, equal: bool) -> MemoryTable {
        self.table.set_comment(report_comment(
            &self.source_name,
            &self.target_name,
            self.use_color,
            equal,
        ));
        self.table
    }
}
