//! Data resources, row cursors and row sinks
//!
//! The diff engine only sees these abstractions. [`MemoryTable`] is the
//! transient in-memory resource: it backs literal rows, structure tables
//! and every materialized report.

use crate::error::{DiffError, Result};
use crate::structure::RelationDef;
use crate::value::{DataType, Value};

/// One row of values, SQL NULL as `None`
pub type Row = Vec<Option<Value>>;

/// Forward-only cursor over the rows of a resource
pub trait RowCursor {
    /// Advance to the next row. `false` once the rows are exhausted.
    fn next(&mut self) -> Result<bool>;

    /// Release the cursor. Closing twice is a no-op.
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    /// Sequence number (1-based) of the current row, 0 before the first `next`
    fn current_row_id(&self) -> u64;

    /// Value of the current row at a 1-based column position
    fn value_at(&self, position: usize) -> Option<&Value>;
}

/// A tabular resource that can be read from the start any number of times
pub trait DataResource {
    fn name(&self) -> &str;

    fn relation_def(&self) -> &RelationDef;

    fn open_cursor(&self) -> Result<Box<dyn RowCursor + '_>>;

    fn row_count(&self) -> Result<u64> {
        let mut cursor = self.open_cursor()?;
        let mut count = 0;
        while cursor.next()? {
            count += 1;
        }
        cursor.close();
        Ok(count)
    }

    /// Resource attributes, by attribute name
    fn attributes(&self) -> Result<Vec<(String, Value)>> {
        let relation = self.relation_def();
        let primary_key = relation
            .primary_key()
            .map(|pk| relation.names_at(pk).join(", "))
            .unwrap_or_default();
        Ok(vec![
            ("column_count".to_string(), Value::from(relation.column_count() as u64)),
            ("primary_key".to_string(), Value::Text(primary_key)),
            ("row_count".to_string(), Value::from(self.row_count()?)),
            (
                "unique_key_count".to_string(),
                Value::from(relation.unique_keys().len() as u64),
            ),
        ])
    }
}

/// Destination of rows. The structure is built once, before any row.
pub trait RowSink {
    fn add_column(&mut self, name: &str, data_type: DataType, nullable: bool) -> Result<()>;

    fn insert_row(&mut self, values: Row) -> Result<()>;
}

/// Rows held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    name: String,
    relation: RelationDef,
    rows: Vec<Row>,
    comment: Option<String>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Empty table with a generated name
    pub fn random() -> Self {
        Self::new(random_name())
    }

    pub fn with_relation(name: impl Into<String>, relation: RelationDef) -> Self {
        Self {
            name: name.into(),
            relation,
            ..Default::default()
        }
    }

    pub fn from_rows(name: impl Into<String>, relation: RelationDef, rows: Vec<Row>) -> Result<Self> {
        let mut table = Self::with_relation(name, relation);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Empty table with the structure (and keys) of another resource
    pub fn empty_like(resource: &dyn DataResource) -> Self {
        Self::with_relation(format!("{}_empty", resource.name()), resource.relation_def().clone())
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        let expected = self.relation.column_count();
        if row.len() != expected {
            return Err(DiffError::invalid_input(format!(
                "The row has {} values while the table ({}) has {} columns",
                row.len(),
                self.name,
                expected
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    /// Values of one column, by name
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<&Value>>> {
        let position = self
            .relation
            .column_by_name(name)
            .map(|c| c.position)
            .ok_or_else(|| DiffError::UnknownColumn {
                column: name.to_string(),
                resource: self.name.clone(),
                available: self.relation.column_names().join(", "),
            })?;
        Ok(self.rows.iter().map(|r| r[position - 1].as_ref()).collect())
    }
}

impl DataResource for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn relation_def(&self) -> &RelationDef {
        &self.relation
    }

    fn open_cursor(&self) -> Result<Box<dyn RowCursor + '_>> {
        Ok(Box::new(MemoryCursor::new(self)))
    }

    fn row_count(&self) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }
}

impl RowSink for MemoryTable {
    fn add_column(&mut self, name: &str, data_type: DataType, nullable: bool) -> Result<()> {
        if !self.rows.is_empty() {
            return Err(DiffError::invalid_input(format!(
                "Cannot add the column ({}) to the table ({}): rows were already inserted",
                name, self.name
            )));
        }
        self.relation.add_column(name, data_type, nullable);
        Ok(())
    }

    fn insert_row(&mut self, values: Row) -> Result<()> {
        self.push_row(values)
    }
}

/// Generated resource name, `memory_` followed by 12 hex digits
pub fn random_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("memory_{}", &id[..12])
}

/// Cursor over a [`MemoryTable`]
#[derive(Debug)]
pub struct MemoryCursor<'a> {
    table: &'a MemoryTable,
    /// Rows consumed so far; the current row is `rows[consumed - 1]`
    consumed: usize,
    closed: bool,
}

impl<'a> MemoryCursor<'a> {
    pub fn new(table: &'a MemoryTable) -> Self {
        Self {
            table,
            consumed: 0,
            closed: false,
        }
    }
}

impl RowCursor for MemoryCursor<'_> {
    fn next(&mut self) -> Result<bool> {
        if self.closed || self.consumed >= self.table.rows.len() {
            return Ok(false);
        }
        self.consumed += 1;
        Ok(true)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn current_row_id(&self) -> u64 {
        self.consumed as u64
    }

    fn value_at(&self, position: usize) -> Option<&Value> {
        if self.closed || self.consumed == 0 {
            return None;
        }
        self.table
            .rows
            .get(self.consumed - 1)
            .and_then(|row| position.checked_sub(1).and_then(|i| row.get(i)))
            .and_then(|v| v.as_ref())
    }
}

/// Key/value table of the resource attributes, keyed and sorted by attribute
pub fn attributes_table(resource: &dyn DataResource) -> Result<MemoryTable> {
    let relation = RelationDef::new()
        .with_column("attribute", DataType::Text)
        .with_column("value", DataType::Text)
        .with_primary_key(&["attribute"])?;

    let mut attributes = resource.attributes()?;
    attributes.sort_by(|a, b| a.0.cmp(&b.0));

    let rows = attributes
        .into_iter()
        .map(|(name, value)| vec![Some(Value::Text(name)), Some(Value::Text(value.to_string()))])
        .collect();

    MemoryTable::from_rows(format!("{}_attributes", resource.name()), relation, rows)
}
