//! Output formatting utilities

use crate::driver::DriverColumns;
use crate::error::Result;
use crate::report::{ColorHints, HighlightColor};
use crate::resource::{DataResource, MemoryTable};
use crate::result::DiffSummary;
use crate::structure::RelationDef;
use crate::value::display_optional;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use indexmap::IndexMap;
use serde::Serialize;

/// Pretty printer for datadiff output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the outcome of a diff
    pub fn print_diff_summary(summary: &DiffSummary) {
        println!("🔍 Diff: {} → {}", summary.source, summary.target);
        if summary.equal {
            println!("├─ {} The data resources are equal", "✅".green());
        } else {
            println!("├─ {} The data resources are not equal", "❌".red());
        }
        println!("├─ Driver columns: {}", summary.driver_columns.join(", "));
        println!("├─ Records: {}", summary.record_count);
        println!("├─ Changes: {}", summary.change_count);
        if let Some(rows) = summary.report_rows {
            println!("├─ Deletions: {}", summary.deletion_count);
            println!("└─ Report rows: {}", rows);
        } else {
            println!("└─ Deletions: {}", summary.deletion_count);
        }
    }

    /// Print a report table, highlighting cells from the colors column
    pub fn print_report(report: &MemoryTable, colors_column: Option<&str>, use_color: bool) {
        if let Some(comment) = report.comment() {
            for line in comment.lines() {
                println!("{}", line.dimmed());
            }
        }
        println!("{}", Self::report_table(report, colors_column, use_color));
    }

    /// Render a report as a table. The colors column is consumed for
    /// highlighting and not displayed when colors are on.
    pub fn report_table(report: &MemoryTable, colors_column: Option<&str>, use_color: bool) -> Table {
        let relation = report.relation_def();
        let colors_position = colors_column
            .and_then(|name| relation.column_by_name(name))
            .map(|c| c.position)
            .filter(|_| use_color);

        let mut table = Table::new();
        if use_color {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        } else {
            table.load_preset(comfy_table::presets::ASCII_FULL);
        }

        let header: Vec<Cell> = relation
            .columns()
            .iter()
            .filter(|c| Some(c.position) != colors_position)
            .map(|c| {
                let cell = Cell::new(&c.name).add_attribute(Attribute::Bold);
                if use_color {
                    cell.fg(TableColor::Cyan)
                } else {
                    cell
                }
            })
            .collect();
        table.set_header(header);

        for row in report.rows() {
            let hints = colors_position
                .and_then(|p| row.get(p - 1))
                .map(|v| ColorHints::parse(&display_optional(v.as_ref())))
                .unwrap_or_default();
            let cells: Vec<Cell> = row
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(i + 1) != colors_position)
                .map(|(i, value)| {
                    let cell = Cell::new(display_optional(value.as_ref()));
                    match hints.color_at(i + 1) {
                        Some(color) => cell.fg(table_color(color)),
                        None => cell,
                    }
                })
                .collect();
            table.add_row(cells);
        }
        table
    }

    /// Print the structure of a resource and its driver columns
    pub fn print_structure(name: &str, relation: &RelationDef, drivers: &DriverColumns) {
        println!("📋 Resource: {}", name);
        println!(
            "├─ Driver columns: {} ({})",
            relation.names_at(drivers.positions()).join(", "),
            drivers.source().description()
        );
        if let Some(pk) = relation.primary_key() {
            println!("├─ Primary key: {}", relation.names_at(pk).join(", "));
        }
        for unique_key in relation.unique_keys() {
            println!("├─ Unique key: {}", relation.names_at(unique_key).join(", "));
        }
        println!("└─ Columns: {}", relation.column_count());
        for (i, column) in relation.columns().iter().enumerate() {
            let prefix = if i == relation.column_count() - 1 { "   └─" } else { "   ├─" };
            let marker = if drivers.is_driver(column.position) { " 🔑" } else { "" };
            println!(
                "{} {}. {} ({}){}",
                prefix, column.position, column.name, column.data_type, marker
            );
        }
    }

    /// Print the files found on one side only of a directory diff
    pub fn print_unmatched(side: &str, files: &[String]) {
        if files.is_empty() {
            return;
        }
        println!("⚠️  Files only in the {}:", side);
        for (i, file) in files.iter().enumerate() {
            let prefix = if i == files.len() - 1 { "└─" } else { "├─" };
            println!("{} {}", prefix, file);
        }
    }
}

fn table_color(color: HighlightColor) -> TableColor {
    match color {
        HighlightColor::Red => TableColor::Red,
        HighlightColor::Green => TableColor::Green,
        HighlightColor::Blue => TableColor::Blue,
    }
}

/// Diff summary and report rows, as written by `--json`
#[derive(Debug, Serialize)]
pub struct JsonDiff {
    #[serde(flatten)]
    pub summary: DiffSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Vec<IndexMap<String, serde_json::Value>>>,
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Report rows as ordered maps, NULL as JSON null
    pub fn report_rows(report: &MemoryTable) -> Vec<IndexMap<String, serde_json::Value>> {
        let names = report.relation_def().column_names();
        report
            .rows()
            .iter()
            .map(|row| {
                names
                    .iter()
                    .zip(row.iter())
                    .map(|(name, value)| {
                        (
                            name.to_string(),
                            value
                                .as_ref()
                                .map(|v| v.to_json())
                                .unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect()
            })
            .collect()
    }

    pub fn format_diff(summary: DiffSummary, report: Option<&MemoryTable>) -> Result<String> {
        Self::format(&JsonDiff {
            summary,
            report: report.map(Self::report_rows),
        })
    }
}
