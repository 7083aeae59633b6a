//! Structural metadata of a data resource

use crate::error::{DiffError, Result};
use crate::resource::MemoryTable;
use crate::value::{DataType, Value};
use serde::{Deserialize, Serialize};

/// One column of a relation. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub position: usize,
    pub data_type: DataType,
    pub nullable: bool,
}

/// Ordered column list with optional primary key and unique keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    columns: Vec<ColumnDef>,
    /// Column positions of the primary key, in key order
    primary_key: Option<Vec<usize>>,
    /// Column positions of each unique key, in declaration order
    unique_keys: Vec<Vec<usize>>,
}

/// Column attribute that identifies a column in a structure diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAttribute {
    Name,
    Position,
}

impl ColumnAttribute {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "position" => Ok(Self::Position),
            _ => Err(format!(
                "Invalid column attribute: {}. Use 'name' or 'position'",
                s
            )),
        }
    }

    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Position => "position",
        }
    }
}

/// Column names are matched without regard to case or surrounding spaces
fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl RelationDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column at the next position
    pub fn add_column(&mut self, name: impl Into<String>, data_type: DataType, nullable: bool) -> &mut Self {
        let position = self.columns.len() + 1;
        self.columns.push(ColumnDef {
            name: name.into(),
            position,
            data_type,
            nullable,
        });
        self
    }

    /// Consuming variant of [`RelationDef::add_column`]
    pub fn with_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.add_column(name, data_type, true);
        self
    }

    pub fn with_primary_key(mut self, names: &[&str]) -> Result<Self> {
        self.set_primary_key(names)?;
        Ok(self)
    }

    pub fn set_primary_key(&mut self, names: &[&str]) -> Result<&mut Self> {
        let positions = self.positions_of(names)?;
        self.primary_key = Some(positions);
        Ok(self)
    }

    pub fn add_unique_key(&mut self, names: &[&str]) -> Result<&mut Self> {
        let positions = self.positions_of(names)?;
        self.unique_keys.push(positions);
        Ok(self)
    }

    fn positions_of(&self, names: &[&str]) -> Result<Vec<usize>> {
        if names.is_empty() {
            return Err(DiffError::invalid_input("A key needs at least one column"));
        }
        names
            .iter()
            .map(|name| {
                self.column_by_name(name)
                    .map(|c| c.position)
                    .ok_or_else(|| DiffError::UnknownColumn {
                        column: name.to_string(),
                        resource: "relation".to_string(),
                        available: self.column_names().join(", "),
                    })
            })
            .collect()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column at a 1-based position
    pub fn column(&self, position: usize) -> Option<&ColumnDef> {
        position.checked_sub(1).and_then(|i| self.columns.get(i))
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ColumnDef> {
        let wanted = normalize(name);
        self.columns.iter().find(|c| normalize(&c.name) == wanted)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn primary_key(&self) -> Option<&[usize]> {
        self.primary_key.as_deref()
    }

    pub fn unique_keys(&self) -> &[Vec<usize>] {
        &self.unique_keys
    }

    /// Names of the columns at the given positions
    pub fn names_at(&self, positions: &[usize]) -> Vec<String> {
        positions
            .iter()
            .filter_map(|p| self.column(*p))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Turn the structure into a table with one row per column, keyed and
    /// sorted by the given attribute, so that two structures can be diffed
    /// like data.
    pub fn columns_table(&self, name: &str, attribute: ColumnAttribute) -> Result<MemoryTable> {
        let relation = RelationDef::new()
            .with_column("name", DataType::Text)
            .with_column("position", DataType::Integer)
            .with_column("data_type", DataType::Text)
            .with_column("nullable", DataType::Boolean)
            .with_primary_key(&[attribute.column_name()])?;

        let mut columns: Vec<&ColumnDef> = self.columns.iter().collect();
        match attribute {
            ColumnAttribute::Name => columns.sort_by(|a, b| a.name.cmp(&b.name)),
            ColumnAttribute::Position => columns.sort_by_key(|c| c.position),
        }

        let rows = columns
            .into_iter()
            .map(|c| {
                vec![
                    Some(Value::Text(c.name.clone())),
                    Some(Value::from(c.position as u64)),
                    Some(Value::Text(c.data_type.to_string())),
                    Some(Value::Boolean(c.nullable)),
                ]
            })
            .collect();

        MemoryTable::from_rows(format!("{}_columns", name), relation, rows)
    }
}
