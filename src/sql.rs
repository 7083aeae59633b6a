//! SQL resource files
//!
//! A `.sql` file defines a query resource. Layout:
//!
//! ```sql
//! -- ATTACH 'host={DB_HOST} user={DB_USER}' AS shop (TYPE postgres);
//! USE shop;
//! SELECT id, name FROM customers ORDER BY id;
//! ```
//!
//! The optional `ATTACH` comment names an external database, `{VAR}`
//! placeholders are read from the environment (and `.env`). Statements
//! before the `SELECT` are run once as setup.

use crate::error::{DiffError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed SQL resource file
#[derive(Debug, Clone)]
pub struct SqlFile {
    /// `ATTACH ...` statement found in a leading comment
    pub attach: Option<String>,
    /// Statements to run before the query
    pub setup: Vec<String>,
    pub query: String,
    pub source_path: PathBuf,
}

impl SqlFile {
    /// Resource name: the file stem
    pub fn name(&self) -> String {
        self.source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "query".to_string())
    }
}

/// Parse a SQL file into its attach statement, setup statements and query
pub fn parse_sql_file(file_path: &Path) -> Result<SqlFile> {
    let content = fs::read_to_string(file_path).map_err(|e| {
        DiffError::invalid_input(format!(
            "Failed to read SQL file '{}': {}",
            file_path.display(),
            e
        ))
    })?;
    parse_sql(&content, file_path)
}

fn parse_sql(content: &str, file_path: &Path) -> Result<SqlFile> {
    let mut attach = None;
    let mut setup_lines = Vec::new();
    let mut query_lines = Vec::new();
    let mut in_select_query = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(comment) = trimmed.strip_prefix("--").or_else(|| trimmed.strip_prefix("//")) {
            let comment = comment.trim();
            if attach.is_none() && comment.to_uppercase().starts_with("ATTACH") {
                attach = Some(comment.trim_end_matches(';').to_string());
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        let upper = trimmed.to_uppercase();
        if !in_select_query && (upper.starts_with("SELECT") || upper.starts_with("WITH")) {
            in_select_query = true;
        }
        if in_select_query {
            query_lines.push(line);
        } else {
            setup_lines.push(line);
        }
    }

    if query_lines.is_empty() {
        return Err(DiffError::invalid_input(format!(
            "No SELECT query found in file '{}'",
            file_path.display()
        )));
    }

    let setup = setup_lines
        .join("\n")
        .split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let query = query_lines
        .join("\n")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string();

    Ok(SqlFile {
        attach,
        setup,
        query,
        source_path: file_path.to_path_buf(),
    })
}

/// Substitute `{VAR}` placeholders with environment variables
pub fn substitute_env_vars(text: &str) -> Result<String> {
    let mut result = text.to_string();

    let mut start = 0;
    while let Some(open_pos) = result[start..].find('{') {
        let open_pos = start + open_pos;
        if let Some(close_pos) = result[open_pos..].find('}') {
            let close_pos = open_pos + close_pos;
            let var_name = &result[open_pos + 1..close_pos];

            let var_value = env::var(var_name).map_err(|_| {
                DiffError::invalid_input(format!(
                    "Environment variable '{}' not found. Make sure it's set in your .env file or environment.",
                    var_name
                ))
            })?;

            result.replace_range(open_pos..=close_pos, &var_value);
            start = open_pos + var_value.len();
        } else {
            start = open_pos + 1;
        }
    }

    Ok(result)
}

/// Load environment variables from .env file if it exists
pub fn load_env_file() -> Result<()> {
    if Path::new(".env").exists() {
        dotenv::dotenv().map_err(|e| {
            DiffError::invalid_input(format!("Failed to load .env file: {}", e))
        })?;
    }
    Ok(())
}

/// Check if a file is a SQL file
pub fn is_sql_file(file_path: &Path) -> bool {
    file_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("sql"))
        .unwrap_or(false)
}
