//! # datadiff
//!
//! A streaming, key-ordered diff engine for tabular data. Two resources
//! sorted on the same driver columns are walked in lockstep, each step is
//! classified as an addition, a deletion, a value change or no change,
//! and the outcome is collected into a report table.

pub mod cast;
pub mod cell;
pub mod cli;
pub mod commands;
pub mod config;
pub mod data;
pub mod driver;
pub mod engine;
pub mod error;
pub mod output;
pub mod progress;
pub mod report;
pub mod resource;
pub mod result;
pub mod sql;
pub mod structure;
pub mod value;

pub use cell::{EqualityMode, EqualityStatus};
pub use config::DiffOptions;
pub use data::{DataProcessor, DuckDbResource};
pub use driver::{resolve_driver_columns, DriverColumns, DriverSource};
pub use engine::{ChangeGuard, DataDiff};
pub use error::{DiffError, Result};
pub use report::{DiffColumn, DiffStatus, ReportDensity, ReportStrategy};
pub use resource::{DataResource, MemoryTable, Row, RowCursor};
pub use result::{DiffResult, DiffSummary};
pub use structure::RelationDef;
pub use value::{DataType, Value};

/// Default number of rows fetched per chunk from DuckDB
pub const DEFAULT_CHUNK_SIZE: usize = data::DEFAULT_CHUNK_SIZE;
