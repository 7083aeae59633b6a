//! Command-line interface for datadiff

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "datadiff")]
#[command(about = "A streaming, key-ordered diff tool for tabular data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a source resource with a target resource
    Diff(DiffArgs),

    /// Show the structure of a resource and its driver columns
    Describe {
        /// Resource: a data file, a SQL file or a table name (with --database)
        resource: String,

        /// Database file holding the tables
        #[arg(long)]
        database: Option<PathBuf>,

        /// Driver columns to check (default: primary key, unique key, all columns)
        #[arg(long, value_delimiter = ',')]
        key: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct DiffArgs {
    /// Source resource: a data file, a SQL file, a table name or a directory
    pub source: String,

    /// Target resource; compare against nothing when absent
    pub target: Option<String>,

    /// Driver columns (default: primary key, unique key, all columns)
    #[arg(long, value_delimiter = ',')]
    pub key: Vec<String>,

    /// Equality mode: "strict" or "loss"
    #[arg(long)]
    pub equality: Option<String>,

    /// Report: "unified", "cell" or "summary"
    #[arg(long)]
    pub report: Option<String>,

    /// Report density: "dense" or "sparse"
    #[arg(long)]
    pub density: Option<String>,

    /// Fail once the number of changes goes over this count
    #[arg(long, value_parser = validate_max_changes)]
    pub max_changes: Option<u64>,

    /// Force terminal colors
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable terminal colors
    #[arg(long)]
    pub no_color: bool,

    /// Prefix of the report metadata columns
    #[arg(long)]
    pub prefix: Option<String>,

    /// Report metadata columns: status,colors,id,change_id,origin,origin_id
    #[arg(long)]
    pub columns: Option<String>,

    /// What to compare: "record", "structure" or "attributes"
    #[arg(long, default_value = "record")]
    pub data_origin: String,

    /// A NULL is not equal to a blank string
    #[arg(long)]
    pub null_is_not_blank: bool,

    /// Database file holding the tables
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// JSON file with the diff options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the report to a file (csv, parquet, json) or, for directories, into a directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with an error when the resources are not equal
    #[arg(long)]
    pub fail: bool,
}

/// What a diff compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// The rows
    Record,
    /// The column metadata
    Structure,
    /// The resource attributes (column count, keys, row count)
    Attributes,
}

impl DataOrigin {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "record" | "data" => Ok(Self::Record),
            "structure" => Ok(Self::Structure),
            "attributes" | "attribute" => Ok(Self::Attributes),
            _ => Err(format!(
                "Invalid data origin: {}. Use 'record', 'structure' or 'attributes'",
                s
            )),
        }
    }
}

/// Validate that the change ceiling is a number
fn validate_max_changes(s: &str) -> Result<u64, String> {
    s.parse()
        .map_err(|_| format!("Invalid max changes: '{}'. Must be a non-negative integer.", s))
}
