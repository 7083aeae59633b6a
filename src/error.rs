//! Error types for datadiff operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiffError>;

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error(
        "We can't compare the data because the source resource ({source_name}) has ({source_columns}) columns \
         while the target resource ({target_name}) has ({target_columns}) columns"
    )]
    StructureMismatch {
        source_name: String,
        source_columns: usize,
        target_name: String,
        target_columns: usize,
    },

    #[error("We can't compare the data because the source resource ({resource}) has no columns")]
    EmptyStructure { resource: String },

    #[error(
        "The column ({column}) was not found in the resource ({resource}) and cannot be used as a driver column. \
         We were expecting one of: {available}"
    )]
    UnknownColumn {
        column: String,
        resource: String,
        available: String,
    },

    #[error("The number of changes detected is greater than the maximum allowed ({max})")]
    TooManyChanges { max: u64 },

    #[error("The data resources ({source_name} and {target_name}) are not equal: {changes} changes")]
    NotEqual {
        source_name: String,
        target_name: String,
        changes: u64,
    },

    #[error("Cast error: {0}")]
    Cast(#[from] crate::cast::CastError),

    #[error("Report error: {message}")]
    Report { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Data processing error: {message}")]
    DataProcessing { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl DiffError {
    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn data_processing(msg: impl Into<String>) -> Self {
        Self::DataProcessing {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// True for the errors raised before the merge loop starts
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::StructureMismatch { .. } | Self::EmptyStructure { .. } | Self::UnknownColumn { .. }
        )
    }
}
