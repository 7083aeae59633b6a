//! Driver column resolution
//!
//! The driver columns identify "the same record" on both sides of a diff.
//! They are resolved once per run, to a list of 1-based positions.

use crate::error::{DiffError, Result};
use crate::structure::RelationDef;
use log::debug;
use serde::Serialize;

/// Where the driver columns came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverSource {
    Explicit,
    PrimaryKey,
    UniqueKey,
    AllColumns,
}

impl DriverSource {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit columns",
            Self::PrimaryKey => "primary key",
            Self::UniqueKey => "first unique key",
            Self::AllColumns => "all columns",
        }
    }
}

/// Resolved driver columns. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverColumns {
    positions: Vec<usize>,
    mask: Vec<bool>,
    source: DriverSource,
}

impl DriverColumns {
    pub fn new(positions: Vec<usize>, column_count: usize, source: DriverSource) -> Result<Self> {
        if positions.is_empty() {
            return Err(DiffError::invalid_input("The driver columns cannot be empty"));
        }
        let mut mask = vec![false; column_count];
        for position in &positions {
            match position.checked_sub(1).and_then(|i| mask.get_mut(i)) {
                Some(slot) => *slot = true,
                None => {
                    return Err(DiffError::invalid_input(format!(
                        "The driver column position ({}) is out of range (1..={})",
                        position, column_count
                    )))
                }
            }
        }
        Ok(Self {
            positions,
            mask,
            source,
        })
    }

    /// Driver positions, in key order
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn is_driver(&self, position: usize) -> bool {
        position
            .checked_sub(1)
            .and_then(|i| self.mask.get(i))
            .copied()
            .unwrap_or(false)
    }

    pub fn source(&self) -> DriverSource {
        self.source
    }

    /// Every column of the relation is a driver column
    pub fn covers_all_columns(&self) -> bool {
        self.mask.iter().all(|d| *d)
    }

    /// Driver positions followed by the remaining positions in column order.
    /// Sorting both inputs on this list satisfies the ascending-order
    /// precondition and makes the output deterministic for duplicate keys.
    pub fn sort_positions(&self) -> Vec<usize> {
        let mut positions = self.positions.clone();
        positions.extend((1..=self.mask.len()).filter(|p| !self.is_driver(*p)));
        positions
    }
}

/// Resolve the driver columns: explicit names, then the primary key, then
/// the first unique key, then all the columns.
pub fn resolve_driver_columns(
    resource_name: &str,
    relation: &RelationDef,
    names: &[String],
) -> Result<DriverColumns> {
    let column_count = relation.column_count();

    if !names.is_empty() {
        let positions = names
            .iter()
            .map(|name| {
                relation
                    .column_by_name(name)
                    .map(|c| c.position)
                    .ok_or_else(|| DiffError::UnknownColumn {
                        column: name.clone(),
                        resource: resource_name.to_string(),
                        available: relation.column_names().join(", "),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Driver columns of {} given explicitly: {:?}", resource_name, names);
        return DriverColumns::new(positions, column_count, DriverSource::Explicit);
    }

    if let Some(primary_key) = relation.primary_key() {
        debug!(
            "Driver columns of {} taken from the primary key: {:?}",
            resource_name,
            relation.names_at(primary_key)
        );
        return DriverColumns::new(primary_key.to_vec(), column_count, DriverSource::PrimaryKey);
    }

    if let Some(unique_key) = relation.unique_keys().first() {
        debug!(
            "Driver columns of {} taken from the first unique key: {:?}",
            resource_name,
            relation.names_at(unique_key)
        );
        return DriverColumns::new(unique_key.clone(), column_count, DriverSource::UniqueKey);
    }

    if column_count == 0 {
        return Err(DiffError::EmptyStructure {
            resource: resource_name.to_string(),
        });
    }

    debug!(
        "No key found for {}, all {} columns are driver columns",
        resource_name, column_count
    );
    DriverColumns::new((1..=column_count).collect(), column_count, DriverSource::AllColumns)
}
