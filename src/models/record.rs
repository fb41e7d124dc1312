//! Record representation
//!
//! This module provides the ordered column-to-value container the engine
//! stages in memory. A record carries its own column names so the staged
//! table can check its shape against the schema before any mutation.

use super::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A single table entry: an ordered list of column/value pairs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Column/value pairs in insertion order
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    /// Create a record from column/value pairs, keeping their order
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Record { fields: pairs }
    }

    /// Set a column value, replacing an existing entry or appending
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Get a column value by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// Returns true if the record carries the column
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.iter().any(|(c, _)| c == column)
    }

    /// Iterate over the column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    /// Iterate over the column/value pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Number of columns in the record
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check the record's column set against the declared columns.
    ///
    /// This is a symmetric set-equality comparison: any extra or missing
    /// column is a mismatch, regardless of ordering.
    pub fn matches_columns(&self, declared: &[String]) -> bool {
        let own: HashSet<&str> = self.columns().collect();
        if own.len() != self.fields.len() {
            // duplicate column names never match a schema
            return false;
        }
        let expected: HashSet<&str> = declared.iter().map(String::as_str).collect();
        own == expected
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{{")?;
        for (i, (column, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", column, value)?;
        }
        write!(f, "}}")
    }
}
