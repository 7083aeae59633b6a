//! The merge diff
//!
//! Both inputs must be sorted ascending on the driver columns. The two
//! cursors are advanced in lockstep and every step is classified as an
//! addition, a deletion, a value change or no change.

use crate::cell::RecordAlignment;
use crate::config::{DiffOptions, ResolvedOptions};
use crate::driver::resolve_driver_columns;
use crate::error::{DiffError, Result};
use crate::progress::ProgressReporter;
use crate::report::{DiffStatus, ReportAccumulator, StepIds};
use crate::resource::{random_name, DataResource, MemoryTable, Row, RowCursor};
use crate::result::{DiffResult, DiffState};
use crate::structure::RelationDef;
use crate::value::DataType;
use log::{debug, info};
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

/// Aborts the run once the change count goes over the ceiling
#[derive(Debug, Clone, Copy)]
pub struct ChangeGuard {
    max: Option<u64>,
}

impl ChangeGuard {
    pub fn new(max: Option<u64>) -> Self {
        Self { max }
    }

    pub fn unbounded() -> Self {
        Self { max: None }
    }

    pub fn check(&self, change_counter: u64) -> Result<()> {
        match self.max {
            Some(max) if change_counter > max => Err(DiffError::TooManyChanges { max }),
            _ => Ok(()),
        }
    }
}

/// Closes the cursor when dropped, whatever the exit path
struct CursorGuard<'a> {
    cursor: Box<dyn RowCursor + 'a>,
}

impl<'a> CursorGuard<'a> {
    fn new(cursor: Box<dyn RowCursor + 'a>) -> Self {
        Self { cursor }
    }
}

impl<'a> Deref for CursorGuard<'a> {
    type Target = dyn RowCursor + 'a;

    fn deref(&self) -> &Self::Target {
        self.cursor.as_ref()
    }
}

impl DerefMut for CursorGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cursor.as_mut()
    }
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        if !self.cursor.is_closed() {
            debug!("Closing cursor at row {}", self.cursor.current_row_id());
            self.cursor.close();
        }
    }
}

/// Diff runner, configured once and reusable across runs
#[derive(Debug, Clone)]
pub struct DataDiff {
    options: ResolvedOptions,
}

impl DataDiff {
    pub fn new(options: DiffOptions) -> Result<Self> {
        Ok(Self {
            options: options.resolve()?,
        })
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Compare two resources. An absent target is an empty resource with
    /// the structure of the source.
    pub fn diff(&self, source: &dyn DataResource, target: Option<&dyn DataResource>) -> Result<DiffResult> {
        let empty;
        let target: &dyn DataResource = match target {
            Some(target) => target,
            None => {
                empty = MemoryTable::empty_like(source);
                &empty
            }
        };

        let column_count = source.relation_def().column_count();
        if column_count == 0 {
            return Err(DiffError::EmptyStructure {
                resource: source.name().to_string(),
            });
        }
        let target_columns = target.relation_def().column_count();
        if target_columns != column_count {
            return Err(DiffError::StructureMismatch {
                source_name: source.name().to_string(),
                source_columns: column_count,
                target_name: target.name().to_string(),
                target_columns,
            });
        }

        let drivers = resolve_driver_columns(
            source.name(),
            source.relation_def(),
            &self.options.driver_columns,
        )?;
        let driver_names = source.relation_def().names_at(drivers.positions());
        info!(
            "Diff of {} against {} on {} ({})",
            source.name(),
            target.name(),
            driver_names.join(", "),
            drivers.source().description()
        );

        let mut accumulator = ReportAccumulator::new(&self.options, source, target, &drivers)?;
        let mut progress = if self.options.show_progress {
            ProgressReporter::new_for_diff(source.name(), target.name())
        } else {
            ProgressReporter::new_minimal()
        };

        let guard = ChangeGuard::new(self.options.max_change_count);
        let mode = self.options.equality;
        let mut state = DiffState::default();

        let mut source_cursor = CursorGuard::new(source.open_cursor()?);
        let mut target_cursor = CursorGuard::new(target.open_cursor()?);

        let mut advance_source = true;
        let mut advance_target = true;
        let mut has_source = false;
        let mut has_target = false;

        loop {
            guard.check(state.change_counter)?;

            if advance_source {
                has_source = source_cursor.next()?;
                if has_source {
                    state.source_record_id += 1;
                } else {
                    source_cursor.close();
                }
            }
            if advance_target {
                has_target = target_cursor.next()?;
                if has_target {
                    state.target_record_id += 1;
                } else {
                    target_cursor.close();
                }
            }
            if !has_source && !has_target {
                break;
            }

            let unit = RecordAlignment::build(
                column_count,
                has_source.then(|| &*source_cursor),
                has_target.then(|| &*target_cursor),
                &drivers,
                self.options.null_equals_blank,
            );

            let status = match (has_source, has_target) {
                (true, true) => {
                    if unit.is_equals_or_loss() {
                        if unit.is_equals(mode) {
                            DiffStatus::NoChange
                        } else {
                            DiffStatus::Value
                        }
                    } else if unit.compare(mode) == Ordering::Greater {
                        DiffStatus::Add
                    } else {
                        DiffStatus::Delete
                    }
                }
                (true, false) => DiffStatus::Delete,
                _ => DiffStatus::Add,
            };
            (advance_source, advance_target) = match status {
                DiffStatus::Value | DiffStatus::NoChange => (true, true),
                DiffStatus::Add => (false, true),
                DiffStatus::Delete => (true, false),
            };

            state.record_diff_counter += 1;
            if status.is_change() {
                state.change_counter += 1;
            }
            if matches!(status, DiffStatus::Delete | DiffStatus::Value) {
                state.deletion_counter += 1;
            }

            let ids = StepIds {
                change_id: status.is_change().then_some(state.change_counter),
                source_row_id: state.source_record_id,
                target_row_id: state.target_record_id,
            };
            accumulator.insert_result_record(&unit, status, ids)?;
            progress.update_steps(state.record_diff_counter, state.change_counter);
        }

        let equal = state.change_counter == 0;
        progress.finish_compare(if equal { "Resources are equal" } else { "Resources differ" });
        info!(
            "Diff done: {} records, {} changes, {} deletions",
            state.record_count(),
            state.change_counter,
            state.deletion_counter
        );

        Ok(DiffResult::new(
            state,
            source.name(),
            target.name(),
            driver_names,
            accumulator.finalize(equal),
        ))
    }

    /// Compare literal rows against a resource. The column types are taken
    /// from the first row (text for NULL) and the columns are named `1..n`.
    pub fn diff_rows(&self, rows: Vec<Row>, target: Option<&dyn DataResource>) -> Result<DiffResult> {
        let source = rows_table(rows)?;
        self.diff(&source, target)
    }
}

/// In-memory table over literal rows
pub fn rows_table(rows: Vec<Row>) -> Result<MemoryTable> {
    let mut relation = RelationDef::new();
    if let Some(first) = rows.first() {
        for (index, value) in first.iter().enumerate() {
            let data_type = value.as_ref().map(|v| v.data_type()).unwrap_or(DataType::Text);
            relation.add_column((index + 1).to_string(), data_type, true);
        }
    }
    MemoryTable::from_rows(random_name(), relation, rows)
}
