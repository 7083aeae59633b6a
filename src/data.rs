//! DuckDB-backed data resources
//!
//! Files (csv, tsv, parquet, json), SQL query files and database tables are
//! exposed as temporary views in one DuckDB connection. Cursors read them
//! in chunks so that only one chunk is held in memory.

use crate::error::{DiffError, Result};
use crate::resource::{DataResource, MemoryTable, Row, RowCursor, RowSink};
use crate::sql::{load_env_file, parse_sql_file, substitute_env_vars};
use crate::structure::RelationDef;
use crate::value::{DataType, Value};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::Connection;
use log::{debug, warn};
use std::collections::VecDeque;
use std::path::Path;

/// Default number of rows fetched per cursor chunk
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Quote a SQL identifier
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Owner of a DuckDB connection and factory of resources
pub struct DataProcessor {
    connection: Connection,
    chunk_size: usize,
}

impl DataProcessor {
    /// Create an in-memory processor with default settings
    pub fn new() -> Result<Self> {
        Self::new_with_config(DEFAULT_CHUNK_SIZE)
    }

    /// Create an in-memory processor with a custom chunk size
    pub fn new_with_config(chunk_size: usize) -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        Self::configure(connection, chunk_size)
    }

    /// Open a database file (created when missing)
    pub fn open(database: &Path, chunk_size: usize) -> Result<Self> {
        let connection = Connection::open(database)?;
        debug!("Opened database {}", database.display());
        Self::configure(connection, chunk_size)
    }

    /// Open a database file that must already exist
    pub fn open_existing(database: &Path, chunk_size: usize) -> Result<Self> {
        if !database.is_file() {
            return Err(DiffError::invalid_input(format!(
                "Database file not found: {}",
                database.display()
            )));
        }
        Self::open(database, chunk_size)
    }

    fn configure(connection: Connection, chunk_size: usize) -> Result<Self> {
        connection.execute_batch(
            "SET enable_progress_bar=false; SET preserve_insertion_order=true;",
        )?;
        Ok(Self {
            connection,
            chunk_size: chunk_size.max(1),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Check if file format is supported
    pub fn is_supported_format(file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "csv" | "tsv" | "parquet" | "json" | "jsonl" | "ndjson" | "sql"
                )
            })
            .unwrap_or(false)
    }

    /// Load a resource file: a data file or a SQL query file
    pub fn load(&self, file_path: &Path) -> Result<DuckDbResource<'_>> {
        if crate::sql::is_sql_file(file_path) {
            self.load_sql_file(file_path)
        } else {
            self.load_file(file_path)
        }
    }

    /// Expose a data file as a view
    pub fn load_file(&self, file_path: &Path) -> Result<DuckDbResource<'_>> {
        if !file_path.is_file() {
            return Err(DiffError::invalid_input(format!(
                "File not found: {}",
                file_path.display()
            )));
        }

        let path = quote_literal(&file_path.to_string_lossy());
        let extension = file_path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        let reader = match extension.as_str() {
            "csv" | "tsv" => format!("read_csv_auto({})", path),
            "parquet" => format!("read_parquet({})", path),
            "json" | "jsonl" | "ndjson" => format!("read_json_auto({})", path),
            _ => {
                return Err(DiffError::invalid_input(format!(
                    "Unsupported file format: {}",
                    file_path.display()
                )))
            }
        };

        let view = view_name();
        self.connection
            .execute(
                &format!("CREATE OR REPLACE TEMP VIEW {} AS SELECT * FROM {}", quote_identifier(&view), reader),
                [],
            )
            .map_err(|e| self.convert_duckdb_error(e, file_path))?;
        debug!("Loaded {} as view {}", file_path.display(), view);

        let relation = self.describe(&view)?;
        Ok(DuckDbResource::new(self, file_path.display().to_string(), view, relation))
    }

    /// Expose the query of a SQL file as a view
    pub fn load_sql_file(&self, file_path: &Path) -> Result<DuckDbResource<'_>> {
        load_env_file()?;
        let sql_file = parse_sql_file(file_path)?;

        if let Some(attach) = &sql_file.attach {
            let attach = substitute_env_vars(attach)?;
            self.connection
                .execute_batch(&attach)
                .map_err(|e| DiffError::data_processing(format!("Failed to attach the database: {}", e)))?;
        }
        for statement in &sql_file.setup {
            self.connection.execute_batch(statement)?;
        }

        let view = view_name();
        self.connection
            .execute(
                &format!("CREATE OR REPLACE TEMP VIEW {} AS {}", quote_identifier(&view), sql_file.query),
                [],
            )
            .map_err(|e| {
                DiffError::data_processing(format!(
                    "Invalid query in the SQL file '{}': {}",
                    file_path.display(),
                    e
                ))
            })?;

        let relation = self.describe(&view)?;
        Ok(DuckDbResource::new(self, sql_file.name(), view, relation))
    }

    /// A table (or view) of the database, with its primary and unique keys
    pub fn table(&self, name: &str) -> Result<DuckDbResource<'_>> {
        let mut relation = self.describe(name).map_err(|_| {
            DiffError::invalid_input(format!("The table ({}) was not found in the database", name))
        })?;

        let mut stmt = self.connection.prepare(
            "SELECT constraint_type, array_to_string(constraint_column_names, ',') \
             FROM duckdb_constraints() \
             WHERE table_name = ? AND constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
             ORDER BY constraint_index",
        )?;
        let constraints = stmt
            .query_map([name], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (kind, columns) in constraints {
            let names: Vec<&str> = columns.split(',').map(str::trim).collect();
            if kind == "PRIMARY KEY" {
                relation.set_primary_key(&names)?;
            } else {
                relation.add_unique_key(&names)?;
            }
        }

        Ok(DuckDbResource::new(self, name.to_string(), name.to_string(), relation))
    }

    /// Column structure of a table or view, via `DESCRIBE`
    pub fn describe(&self, relation_name: &str) -> Result<RelationDef> {
        let mut stmt = self
            .connection
            .prepare(&format!("DESCRIBE {}", quote_identifier(relation_name)))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut relation = RelationDef::new();
        for row in rows {
            let (name, type_name, null) = row?;
            let nullable = null.map(|n| n.eq_ignore_ascii_case("YES")).unwrap_or(true);
            relation.add_column(name, DataType::from_sql(&type_name), nullable);
        }
        Ok(relation)
    }

    /// Write a memory table into a new database table
    pub fn write_table(&self, table: &MemoryTable, name: &str) -> Result<()> {
        let mut sink = DuckDbSink::new(&self.connection, name);
        for column in table.relation_def().columns() {
            sink.add_column(&column.name, column.data_type, column.nullable)?;
        }
        for row in table.rows() {
            sink.insert_row(row.clone())?;
        }
        sink.finish()?;
        debug!("Wrote {} rows into {}", table.rows().len(), name);
        Ok(())
    }

    /// Copy a table to a file. The format follows the extension.
    pub fn export_table(&self, name: &str, file_path: &Path) -> Result<()> {
        let extension = file_path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        let options = match extension.as_str() {
            "csv" => "(FORMAT CSV, HEADER)",
            "tsv" => "(FORMAT CSV, HEADER, DELIMITER '\t')",
            "parquet" => "(FORMAT PARQUET)",
            "json" | "jsonl" | "ndjson" => "(FORMAT JSON)",
            _ => {
                return Err(DiffError::invalid_input(format!(
                    "Unsupported output format: {}",
                    file_path.display()
                )))
            }
        };
        self.connection.execute(
            &format!(
                "COPY {} TO {} {}",
                quote_identifier(name),
                quote_literal(&file_path.to_string_lossy()),
                options
            ),
            [],
        )?;
        Ok(())
    }

    /// Convert DuckDB errors raised while reading a file
    fn convert_duckdb_error(&self, error: duckdb::Error, file_path: &Path) -> DiffError {
        let error_msg = error.to_string();

        if error_msg.contains("CSV Error")
            || error_msg.contains("Could not convert")
            || error_msg.contains("Invalid CSV")
            || error_msg.contains("Unterminated quoted field")
        {
            DiffError::invalid_input(format!(
                "Malformed CSV file '{}': {}",
                file_path.display(),
                error_msg
            ))
        } else if error_msg.contains("JSON") {
            DiffError::invalid_input(format!(
                "Malformed JSON file '{}': {}",
                file_path.display(),
                error_msg
            ))
        } else if error_msg.contains("No files found") || error_msg.contains("does not exist") {
            DiffError::invalid_input(format!("File not found: {}", file_path.display()))
        } else if error_msg.contains("Permission denied") {
            DiffError::invalid_input(format!(
                "Permission denied accessing file: {}",
                file_path.display()
            ))
        } else {
            DiffError::DuckDb(error)
        }
    }
}

fn view_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("view_{}", &id[..12])
}

/// A table, view or query of a [`DataProcessor`]
pub struct DuckDbResource<'c> {
    processor: &'c DataProcessor,
    name: String,
    relation_name: String,
    relation: RelationDef,
    order_by: Option<Vec<usize>>,
}

impl<'c> DuckDbResource<'c> {
    fn new(processor: &'c DataProcessor, name: String, relation_name: String, relation: RelationDef) -> Self {
        Self {
            processor,
            name,
            relation_name,
            relation,
            order_by: None,
        }
    }

    /// Read the rows sorted on the given 1-based positions, NULL first
    pub fn ordered_by(mut self, positions: Vec<usize>) -> Self {
        self.order_by = Some(positions);
        self
    }

    /// Select statement of the columns, in no particular order
    pub fn select_query(&self) -> String {
        // Types without a dedicated value are read as text
        let columns: Vec<String> = self
            .relation
            .columns()
            .iter()
            .map(|c| {
                let column = quote_identifier(&c.name);
                match c.data_type {
                    DataType::Text => format!("CAST({} AS VARCHAR) AS {}", column, column),
                    DataType::Double => format!("CAST({} AS DOUBLE) AS {}", column, column),
                    _ => column,
                }
            })
            .collect();
        format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_identifier(&self.relation_name)
        )
    }

    /// Sort terms on the selected column names, NULL first
    pub fn order_terms(&self) -> Option<String> {
        let positions = self.order_by.as_ref()?;
        let terms: Vec<String> = positions
            .iter()
            .filter_map(|p| self.relation.column(*p))
            .map(|c| format!("{} ASC NULLS FIRST", quote_identifier(&c.name)))
            .collect();
        if terms.len() != positions.len() {
            warn!("Ignoring out of range order positions for {}", self.name);
        }
        (!terms.is_empty()).then(|| terms.join(", "))
    }
}

impl DataResource for DuckDbResource<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn relation_def(&self) -> &RelationDef {
        &self.relation
    }

    fn open_cursor(&self) -> Result<Box<dyn RowCursor + '_>> {
        debug!("Opening cursor on {}", self.name);
        Ok(Box::new(DuckDbCursor::new(
            &self.processor.connection,
            self.select_query(),
            self.order_terms(),
            self.relation.column_count(),
            self.processor.chunk_size,
        )))
    }

    fn row_count(&self) -> Result<u64> {
        let count: i64 = self.processor.connection.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.relation_name)),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

/// Row number column of the cursor snapshot table
const ROW_NUMBER_COLUMN: &str = "__datadiff_row";

/// Cursor over a query. On the first `next`, the query is run once into a
/// temporary table numbered in read order; chunks are then read by row
/// number range, so the sort happens once and the order is stable.
pub struct DuckDbCursor<'c> {
    connection: &'c Connection,
    query: String,
    order: Option<String>,
    snapshot: Option<String>,
    column_count: usize,
    chunk_size: usize,
    offset: u64,
    buffer: VecDeque<Row>,
    current: Option<Row>,
    row_id: u64,
    exhausted: bool,
    closed: bool,
}

impl<'c> DuckDbCursor<'c> {
    pub fn new(
        connection: &'c Connection,
        query: String,
        order: Option<String>,
        column_count: usize,
        chunk_size: usize,
    ) -> Self {
        Self {
            connection,
            query,
            order,
            snapshot: None,
            column_count,
            chunk_size,
            offset: 0,
            buffer: VecDeque::new(),
            current: None,
            row_id: 0,
            exhausted: false,
            closed: false,
        }
    }

    fn snapshot(&mut self) -> Result<String> {
        if let Some(table) = &self.snapshot {
            return Ok(table.clone());
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        let table = format!("cursor_{}", &id[..12]);
        let window = self
            .order
            .as_ref()
            .map(|terms| format!("ORDER BY {}", terms))
            .unwrap_or_default();
        self.connection.execute_batch(&format!(
            "CREATE TEMP TABLE {} AS SELECT row_number() OVER ({}) AS {}, * FROM ({}) AS source",
            quote_identifier(&table),
            window,
            ROW_NUMBER_COLUMN,
            self.query
        ))?;
        debug!("Cursor snapshot {} created", table);
        self.snapshot = Some(table.clone());
        Ok(table)
    }

    fn fetch_chunk(&mut self) -> Result<()> {
        let table = self.snapshot()?;
        let sql = format!(
            "SELECT * EXCLUDE ({rn}) FROM {table} WHERE {rn} > {from} AND {rn} <= {to} ORDER BY {rn}",
            rn = ROW_NUMBER_COLUMN,
            table = quote_identifier(&table),
            from = self.offset,
            to = self.offset + self.chunk_size as u64,
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut fetched = 0;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(self.column_count);
            for i in 0..self.column_count {
                values.push(value_from_ref(row.get_ref(i)?));
            }
            self.buffer.push_back(values);
            fetched += 1;
        }
        debug!("Fetched {} rows after row {}", fetched, self.offset);
        self.offset += fetched as u64;
        if fetched < self.chunk_size {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl RowCursor for DuckDbCursor<'_> {
    fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_chunk()?;
        }
        self.current = self.buffer.pop_front();
        if self.current.is_some() {
            self.row_id += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.current = None;
        self.buffer.clear();
        if let Some(table) = self.snapshot.take() {
            let drop = format!("DROP TABLE IF EXISTS {}", quote_identifier(&table));
            if let Err(e) = self.connection.execute_batch(&drop) {
                warn!("Cannot drop the cursor snapshot {}: {}", table, e);
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn current_row_id(&self) -> u64 {
        self.row_id
    }

    fn value_at(&self, position: usize) -> Option<&Value> {
        self.current
            .as_ref()
            .and_then(|row| position.checked_sub(1).and_then(|i| row.get(i)))
            .and_then(|v| v.as_ref())
    }
}

impl Drop for DuckDbCursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

fn timestamp_from(unit: TimeUnit, value: i64) -> Option<chrono::NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => value.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => value.checked_mul(1_000)?,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    };
    chrono::DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

/// Convert a DuckDB value, NULL as `None`
pub fn value_from_ref(value: ValueRef<'_>) -> Option<Value> {
    let converted = match value {
        ValueRef::Null => return None,
        ValueRef::Boolean(b) => Value::Boolean(b),
        ValueRef::TinyInt(i) => Value::Integer(i as i64),
        ValueRef::SmallInt(i) => Value::Integer(i as i64),
        ValueRef::Int(i) => Value::Integer(i as i64),
        ValueRef::BigInt(i) => Value::Integer(i),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Double(i as f64)),
        ValueRef::UTinyInt(i) => Value::Integer(i as i64),
        ValueRef::USmallInt(i) => Value::Integer(i as i64),
        ValueRef::UInt(i) => Value::Integer(i as i64),
        ValueRef::UBigInt(i) => Value::from(i),
        ValueRef::Float(f) => Value::Double(f as f64),
        ValueRef::Double(f) => Value::Double(f),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>().map(Value::Double).unwrap_or(Value::Text(text))
        }
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        // Days since 1970-01-01; `infinity` is stored as i32::MAX
        ValueRef::Date32(days) => days
            .checked_add(719_163)
            .and_then(chrono::NaiveDate::from_num_days_from_ce_opt)
            .map(Value::Date)
            .unwrap_or_else(|| Value::Text(days.to_string())),
        ValueRef::Timestamp(unit, ts) => timestamp_from(unit, ts)
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::Text(ts.to_string())),
        other => Value::Text(format!("{:?}", other.to_owned())),
    };
    Some(converted)
}

/// Convert a value into a DuckDB parameter. Dates and timestamps travel as
/// text and are cast back by the insert statement.
fn to_duckdb_value(value: Option<Value>) -> duckdb::types::Value {
    use duckdb::types::Value as Db;
    match value {
        None => Db::Null,
        Some(Value::Boolean(b)) => Db::Boolean(b),
        Some(Value::Integer(i)) => Db::BigInt(i),
        Some(Value::Double(d)) => Db::Double(d),
        Some(Value::Blob(b)) => Db::Blob(b),
        Some(other) => Db::Text(other.to_string()),
    }
}

/// Row sink writing into a new DuckDB table, created before the first row
pub struct DuckDbSink<'c> {
    connection: &'c Connection,
    table_name: String,
    columns: Vec<(String, DataType, bool)>,
    insert_sql: Option<String>,
}

impl<'c> DuckDbSink<'c> {
    pub fn new(connection: &'c Connection, table_name: impl Into<String>) -> Self {
        Self {
            connection,
            table_name: table_name.into(),
            columns: Vec::new(),
            insert_sql: None,
        }
    }

    fn create(&mut self) -> Result<()> {
        if self.insert_sql.is_some() {
            return Ok(());
        }
        let exists: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [&self.table_name],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(DiffError::report(format!(
                "The table ({}) already exists",
                self.table_name
            )));
        }

        let definitions: Vec<String> = self
            .columns
            .iter()
            .map(|(name, data_type, nullable)| {
                let null = if *nullable { "" } else { " NOT NULL" };
                format!("{} {}{}", quote_identifier(name), data_type.sql_name(), null)
            })
            .collect();
        self.connection.execute(
            &format!(
                "CREATE TABLE {} ({})",
                quote_identifier(&self.table_name),
                definitions.join(", ")
            ),
            [],
        )?;

        let placeholders: Vec<String> = self
            .columns
            .iter()
            .map(|(_, data_type, _)| format!("CAST(? AS {})", data_type.sql_name()))
            .collect();
        self.insert_sql = Some(format!(
            "INSERT INTO {} VALUES ({})",
            quote_identifier(&self.table_name),
            placeholders.join(", ")
        ));
        Ok(())
    }

    /// Create the table even when no row was inserted
    pub fn finish(&mut self) -> Result<()> {
        self.create()
    }
}

impl RowSink for DuckDbSink<'_> {
    fn add_column(&mut self, name: &str, data_type: DataType, nullable: bool) -> Result<()> {
        if self.insert_sql.is_some() {
            return Err(DiffError::invalid_input(format!(
                "Cannot add the column ({}) to the table ({}): it is already created",
                name, self.table_name
            )));
        }
        self.columns.push((name.to_string(), data_type, nullable));
        Ok(())
    }

    fn insert_row(&mut self, values: Row) -> Result<()> {
        self.create()?;
        if values.len() != self.columns.len() {
            return Err(DiffError::invalid_input(format!(
                "The row has {} values while the table ({}) has {} columns",
                values.len(),
                self.table_name,
                self.columns.len()
            )));
        }
        let params: Vec<duckdb::types::Value> = values.into_iter().map(to_duckdb_value).collect();
        if let Some(sql) = &self.insert_sql {
            let mut stmt = self.connection.prepare_cached(sql)?;
            stmt.execute(duckdb::params_from_iter(params.iter()))?;
        }
        Ok(())
    }
}
