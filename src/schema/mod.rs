//! Table schema definitions
//!
//! This module provides the immutable, per-table description the engine is
//! driven by: column names and types, synthetic key columns, declared
//! relations and the table kind. Schemas are produced once at startup by
//! the catalog loader and shared read-only afterwards.

mod loader;

pub use loader::load_catalog;
#[cfg(test)]
pub(crate) use loader::parse_catalog;

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a declared table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// Top-level entity table with a synthetic integer key
    Main,

    /// Entity table with a synthetic key but no top-level relation handling
    Sub,

    /// Pure join table, identified by its full value-tuple, no synthetic key
    Relation,
}

/// Declared scalar type of a non-key column.
///
/// Only used to drive the store-level column typing when a table is
/// persisted; in memory every cell is a [`crate::models::Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Integer column (SQLite INTEGER)
    Integer,

    /// Floating point column (SQLite REAL)
    Float,

    /// Text column (SQLite TEXT)
    Text,

    /// Time-of-day column, carried as `HH:MM:SS` text (SQLite TEXT)
    Time,
}

impl ColumnType {
    /// SQLite column type used when creating the physical table
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Text | ColumnType::Time => "TEXT",
        }
    }
}

/// A declared relation from one table into another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRelation {
    /// Name of the related table
    pub table: String,

    /// Column used to join into the related table
    pub key_column: String,
}

/// Schema of one declared table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name (unique within the catalog)
    pub name: String,

    /// Ordered column names, synthetic key columns included
    pub columns: Vec<String>,

    /// Declared type of each non-key column
    pub column_types: HashMap<String, ColumnType>,

    /// Column name to the table it semantically references
    /// (empty string when the column references nothing)
    pub column_relations: HashMap<String, String>,

    /// Declared relations, in declaration order.
    ///
    /// Kept as a list rather than a map so duplicate declarations remain
    /// observable; relation lookup treats more than one match for the same
    /// target table as a schema defect.
    pub table_relations: Vec<TableRelation>,

    /// Ordered synthetic key columns (empty for relation tables)
    pub table_keys: Vec<String>,

    /// Kind of the table
    pub kind: TableKind,

    /// For relation tables, the owning side of the relation
    pub top_table: Option<String>,
}

impl TableSchema {
    /// Create a schema, validating its structural invariants
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        columns: Vec<String>,
        column_types: HashMap<String, ColumnType>,
        column_relations: HashMap<String, String>,
        table_relations: Vec<TableRelation>,
        table_keys: Vec<String>,
        kind: TableKind,
        top_table: Option<String>,
    ) -> Result<Self> {
        if kind == TableKind::Relation && !table_keys.is_empty() {
            return Err(EngineError::MalformedSchema(format!(
                "relation table '{}' must not declare key columns",
                name
            )));
        }
        if table_keys.len() > 1 {
            return Err(EngineError::MalformedSchema(format!(
                "table '{}' declares more than one key column",
                name
            )));
        }
        for key in &table_keys {
            if !columns.contains(key) {
                return Err(EngineError::MalformedSchema(format!(
                    "key column '{}' of table '{}' is not a declared column",
                    key, name
                )));
            }
        }
        for column in column_types.keys() {
            if !columns.contains(column) {
                return Err(EngineError::MalformedSchema(format!(
                    "typed column '{}' of table '{}' is not a declared column",
                    column, name
                )));
            }
        }

        Ok(TableSchema {
            name,
            columns,
            column_types,
            column_relations,
            table_relations,
            table_keys,
            kind,
            top_table,
        })
    }

    /// Returns true if the schema declares the column
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// The synthetic key column, if the table is keyed
    pub fn key_column(&self) -> Option<&str> {
        self.table_keys.first().map(String::as_str)
    }

    /// Returns true if the table carries a synthetic key
    pub fn is_keyed(&self) -> bool {
        !self.table_keys.is_empty()
    }

    /// Returns true if the table is a relation table
    pub fn is_relation(&self) -> bool {
        self.kind == TableKind::Relation
    }

    /// The column that joins into the declared top table, if any.
    ///
    /// Resolved through `column_relations`: the first declared column whose
    /// relation target equals the top table's name.
    pub fn top_table_key(&self) -> Option<&str> {
        let top = self.top_table.as_deref()?;
        self.columns
            .iter()
            .find(|c| self.column_relations.get(*c).map(String::as_str) == Some(top))
            .map(String::as_str)
    }
}
