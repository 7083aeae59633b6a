//! Cell equality and ordering, and the per-step record alignment
//!
//! A [`Cell`] pairs the source and target values found at one column
//! position. Its equality status is computed once, at construction.

use crate::cast::cast;
use crate::driver::DriverColumns;
use crate::resource::RowCursor;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Equality classification of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityStatus {
    /// Both absent, or same type and same value
    StrictEqual,
    /// Same value in another representation (cast, blank string vs NULL)
    LossEqual,
    NotEqual,
}

impl EqualityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrictEqual => "strict_equal",
            Self::LossEqual => "loss_equal",
            Self::NotEqual => "not_equal",
        }
    }
}

impl fmt::Display for EqualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-wide equality mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityMode {
    /// Only strictly equal cells are equal
    #[default]
    Strict,
    /// Strictly equal and loss-equal cells are equal
    Loss,
}

impl EqualityMode {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "loss" => Ok(Self::Loss),
            _ => Err(format!("Invalid equality mode: {}. Use 'strict' or 'loss'", s)),
        }
    }

    pub fn accepts(&self, status: EqualityStatus) -> bool {
        match self {
            Self::Strict => status == EqualityStatus::StrictEqual,
            Self::Loss => status != EqualityStatus::NotEqual,
        }
    }
}

/// Source and target values at one column position
#[derive(Debug, Clone)]
pub struct Cell<'a> {
    position: usize,
    source: Option<&'a Value>,
    target: Option<&'a Value>,
    status: EqualityStatus,
    driver: bool,
}

impl<'a> Cell<'a> {
    /// `null_equals_blank` makes an absent value loss-equal to a blank string
    pub fn new(
        position: usize,
        source: Option<&'a Value>,
        target: Option<&'a Value>,
        driver: bool,
        null_equals_blank: bool,
    ) -> Self {
        Self {
            position,
            source,
            target,
            status: classify(source, target, null_equals_blank),
            driver,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn source_value(&self) -> Option<&'a Value> {
        self.source
    }

    pub fn target_value(&self) -> Option<&'a Value> {
        self.target
    }

    pub fn status(&self) -> EqualityStatus {
        self.status
    }

    pub fn is_driver(&self) -> bool {
        self.driver
    }

    pub fn is_equals(&self, mode: EqualityMode) -> bool {
        mode.accepts(self.status)
    }

    /// Order of the source value relative to the target value.
    /// NULL sorts first; values of different types are cast (LOSS mode)
    /// or compared as strings.
    pub fn compare(&self, mode: EqualityMode) -> Ordering {
        match (self.source, self.target) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(source), Some(target)) => {
                if source.data_type() == target.data_type() {
                    return source
                        .natural_cmp(target)
                        .unwrap_or_else(|| source.lexical_cmp(target));
                }
                if mode == EqualityMode::Loss {
                    if let Ok(converted) = cast(source, target.data_type()) {
                        if let Some(ordering) = converted.natural_cmp(target) {
                            return ordering;
                        }
                    }
                }
                source.lexical_cmp(target)
            }
        }
    }
}

fn classify(source: Option<&Value>, target: Option<&Value>, null_equals_blank: bool) -> EqualityStatus {
    match (source, target) {
        (None, None) => EqualityStatus::StrictEqual,
        (None, Some(present)) | (Some(present), None) => {
            if null_equals_blank && present.is_blank() {
                EqualityStatus::LossEqual
            } else {
                EqualityStatus::NotEqual
            }
        }
        (Some(source), Some(target)) => {
            if source == target {
                return EqualityStatus::StrictEqual;
            }
            if source.is_blank() && target.is_blank() {
                return EqualityStatus::LossEqual;
            }
            if source.data_type() == target.data_type() {
                return EqualityStatus::NotEqual;
            }
            match cast(source, target.data_type()) {
                Ok(converted) if converted == *target => EqualityStatus::LossEqual,
                _ => EqualityStatus::NotEqual,
            }
        }
    }
}

/// All the cells of one comparison step, plus row-level equality and
/// ordering derived from the driver cells
#[derive(Debug)]
pub struct RecordAlignment<'a> {
    cells: Vec<Cell<'a>>,
    drivers: &'a DriverColumns,
    has_source: bool,
    has_target: bool,
}

impl<'a> RecordAlignment<'a> {
    /// Build the cells from the current row of each present side.
    /// An absent side contributes NULL for every cell.
    pub fn build(
        column_count: usize,
        source: Option<&'a dyn RowCursor>,
        target: Option<&'a dyn RowCursor>,
        drivers: &'a DriverColumns,
        null_equals_blank: bool,
    ) -> Self {
        debug_assert!(!drivers.positions().is_empty());
        let cells = (1..=column_count)
            .map(|position| {
                Cell::new(
                    position,
                    source.and_then(|c| c.value_at(position)),
                    target.and_then(|c| c.value_at(position)),
                    drivers.is_driver(position),
                    null_equals_blank,
                )
            })
            .collect();
        Self {
            cells,
            drivers,
            has_source: source.is_some(),
            has_target: target.is_some(),
        }
    }

    pub fn cells(&self) -> &[Cell<'a>] {
        &self.cells
    }

    /// Driver cells, in driver column order
    pub fn driver_cells(&self) -> impl Iterator<Item = &Cell<'a>> {
        self.drivers
            .positions()
            .iter()
            .filter_map(move |p| self.cells.get(p - 1))
    }

    pub fn drivers(&self) -> &DriverColumns {
        self.drivers
    }

    pub fn has_source(&self) -> bool {
        self.has_source
    }

    pub fn has_target(&self) -> bool {
        self.has_target
    }

    /// Every cell equal under the mode
    pub fn is_equals(&self, mode: EqualityMode) -> bool {
        self.cells.iter().all(|c| c.is_equals(mode))
    }

    /// Driver cells strictly or loss equal: both rows are the same record
    pub fn is_equals_or_loss(&self) -> bool {
        self.driver_cells()
            .all(|c| c.status() != EqualityStatus::NotEqual)
    }

    /// Lexicographic order of the source key relative to the target key
    pub fn compare(&self, mode: EqualityMode) -> Ordering {
        self.driver_cells()
            .map(|c| c.compare(mode))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    /// Rendered driver values of the present side, joined for display
    pub fn key_text(&self) -> String {
        self.driver_cells()
            .map(|c| {
                crate::value::display_optional(if self.has_source {
                    c.source_value()
                } else {
                    c.target_value()
                })
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
