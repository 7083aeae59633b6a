//! Diff options
//!
//! [`DiffOptions`] is what callers set (or load from a JSON file); it is
//! resolved once into [`ResolvedOptions`] before a run starts.

use crate::cell::EqualityMode;
use crate::error::{DiffError, Result};
use crate::report::{DiffColumn, ReportDensity, ReportStrategy};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::Path;

/// Default prefix of the report metadata columns
pub const DEFAULT_COLUMN_PREFIX: &str = "diff_";

/// Options of a diff run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Driver column names, overriding the key resolution
    pub driver_columns: Vec<String>,
    pub equality: EqualityMode,
    pub report: ReportStrategy,
    pub density: ReportDensity,
    /// Unbounded when absent
    pub max_change_count: Option<u64>,
    /// Defaults to whether stdout is a terminal
    pub use_color: Option<bool>,
    pub column_prefix: String,
    /// Metadata columns of the unified report, `[status]` when absent
    pub diff_columns: Option<Vec<DiffColumn>>,
    /// A NULL and a blank string are loss-equal
    pub null_equals_blank: bool,
    pub show_progress: bool,
    /// Name of the report table, random when absent
    pub report_name: Option<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            driver_columns: Vec::new(),
            equality: EqualityMode::Strict,
            report: ReportStrategy::Unified,
            density: ReportDensity::Dense,
            max_change_count: None,
            use_color: None,
            column_prefix: DEFAULT_COLUMN_PREFIX.to_string(),
            diff_columns: None,
            null_equals_blank: true,
            show_progress: false,
            report_name: None,
        }
    }
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON file. Missing fields take their default.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DiffError::config(format!("Cannot read the options file {}: {}", path.display(), e))
        })?;
        let options = serde_json::from_str(&content).map_err(|e| {
            DiffError::config(format!("Invalid options file {}: {}", path.display(), e))
        })?;
        Ok(options)
    }

    pub fn with_driver_columns<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.driver_columns = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_equality(mut self, equality: EqualityMode) -> Self {
        self.equality = equality;
        self
    }

    pub fn with_report(mut self, report: ReportStrategy) -> Self {
        self.report = report;
        self
    }

    pub fn with_density(mut self, density: ReportDensity) -> Self {
        self.density = density;
        self
    }

    pub fn with_max_change_count(mut self, max: u64) -> Self {
        self.max_change_count = Some(max);
        self
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = Some(use_color);
        self
    }

    pub fn with_column_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.column_prefix = prefix.into();
        self
    }

    pub fn with_diff_columns(mut self, columns: Vec<DiffColumn>) -> Self {
        self.diff_columns = Some(columns);
        self
    }

    pub fn with_null_equals_blank(mut self, enabled: bool) -> Self {
        self.null_equals_blank = enabled;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_report_name(mut self, name: impl Into<String>) -> Self {
        self.report_name = Some(name.into());
        self
    }

    /// Apply the defaults that depend on the environment or on other options
    pub fn resolve(&self) -> Result<ResolvedOptions> {
        let use_color = self
            .use_color
            .unwrap_or_else(|| std::io::stdout().is_terminal());

        let prefix = self.column_prefix.trim().to_lowercase();
        if prefix.chars().any(|c| c.is_whitespace()) {
            return Err(DiffError::config(format!(
                "The report column prefix ({}) cannot contain spaces",
                self.column_prefix
            )));
        }

        let mut diff_columns: Vec<DiffColumn> = Vec::new();
        for column in self.diff_columns.iter().flatten() {
            if !diff_columns.contains(column) {
                diff_columns.push(*column);
            }
        }
        if !diff_columns.contains(&DiffColumn::Status) {
            diff_columns.insert(0, DiffColumn::Status);
        }
        if use_color && !diff_columns.contains(&DiffColumn::Colors) {
            diff_columns.push(DiffColumn::Colors);
        }

        Ok(ResolvedOptions {
            driver_columns: self.driver_columns.clone(),
            equality: self.equality,
            report: self.report,
            density: self.density,
            max_change_count: self.max_change_count,
            use_color,
            column_prefix: prefix,
            diff_columns,
            null_equals_blank: self.null_equals_blank,
            show_progress: self.show_progress,
            report_name: self.report_name.clone(),
        })
    }
}

/// Options of one run, after defaults are applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub driver_columns: Vec<String>,
    pub equality: EqualityMode,
    pub report: ReportStrategy,
    pub density: ReportDensity,
    pub max_change_count: Option<u64>,
    pub use_color: bool,
    pub column_prefix: String,
    /// Always contains the status column
    pub diff_columns: Vec<DiffColumn>,
    pub null_equals_blank: bool,
    pub show_progress: bool,
    pub report_name: Option<String>,
}
