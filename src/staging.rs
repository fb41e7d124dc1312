//! Per-table staging
//!
//! This module provides the mutable working copy of one table. A staged
//! table is created by reading the backing store (auto-provisioning the
//! physical table when it does not exist yet), then mutated purely in
//! memory; it is synchronized *to* the store only on an explicit persist
//! and *from* the store only on an explicit reload.
//!
//! Two invariant regimes apply. Keyed tables (those declaring an ID column)
//! index rows by the synthetic key: adds assign the next key, modifies and
//! deletes address rows by key. Relation tables are keyless: a row is its
//! full value-tuple, duplicates are rejected, and modification is forbidden
//! outright.

use crate::error::{EngineError, Result};
use crate::models::{Record, Value};
use crate::schema::TableSchema;
use crate::store::TableStore;
use log::{debug, info};
use std::sync::Arc;

/// Sentinel returned where a relation table has no meaningful key
pub const NO_KEY: i64 = -1;

/// In-memory working copy of one table
pub struct StagedTable {
    schema: Arc<TableSchema>,
    rows: Vec<Record>,
}

impl StagedTable {
    /// Build the staged table by reading the backing store.
    ///
    /// An absent physical table is the recoverable case: the working copy
    /// starts empty and the table is created in the store right away. Any
    /// other store failure propagates.
    pub fn load(schema: Arc<TableSchema>, store: &mut TableStore) -> Result<Self> {
        let rows = match store.read_table(&schema) {
            Ok(rows) => rows,
            Err(EngineError::TableAbsent(_)) => {
                info!("table '{}' absent from store, provisioning empty", schema.name);
                store.create_table(&schema)?;
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        debug!("staged table '{}' with {} rows", schema.name, rows.len());
        Ok(StagedTable { schema, rows })
    }

    /// The owning schema
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Current working rows, in staging order
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Defensive copy of the current working rows
    pub fn snapshot(&self) -> Vec<Record> {
        self.rows.clone()
    }

    /// Write the full working copy back to the store, replacing prior
    /// contents. Keyed tables are ordered ascending by key first when
    /// `sorted` is set, for deterministic output.
    pub fn persist(&self, store: &mut TableStore, sorted: bool) -> Result<()> {
        match self.schema.key_column() {
            Some(key_column) if sorted => {
                let mut ordered = self.rows.clone();
                ordered.sort_by_key(|row| {
                    row.get(key_column).and_then(Value::as_key).unwrap_or(i64::MIN)
                });
                store.replace_table(&self.schema, &ordered)
            }
            _ => store.replace_table(&self.schema, &self.rows),
        }
    }

    /// Replace the working copy with the store's current contents,
    /// discarding any in-memory edits.
    pub fn reload(&mut self, store: &TableStore) -> Result<()> {
        self.rows = store.read_table(&self.schema)?;
        debug!("reloaded '{}' ({} rows)", self.schema.name, self.rows.len());
        Ok(())
    }

    /// Add a record.
    ///
    /// Keyed tables assign the synthetic key (0 when empty, max + 1
    /// otherwise) regardless of what the caller put in the key column, and
    /// return it. Relation tables reject duplicate value-tuples and return
    /// the appended row's positional index.
    pub fn add_entry(&mut self, record: &Record) -> Result<i64> {
        self.check_shape(record)?;
        let mut row = self.normalize(record);

        if let Some(key_column) = self.schema.key_column() {
            let key = next_key(&self.rows, key_column);
            row.set(key_column, Value::Int(key));
            self.rows.push(row);
            Ok(key)
        } else {
            if self.rows.iter().any(|existing| existing == &row) {
                return Err(EngineError::DuplicateKey(self.schema.name.clone()));
            }
            self.rows.push(row);
            Ok((self.rows.len() - 1) as i64)
        }
    }

    /// Overwrite the non-key columns of the row addressed by the record's
    /// key. Relation tables have no identity to preserve across a modify,
    /// so the operation is forbidden for them regardless of the tuple.
    pub fn modify_entry(&mut self, record: &Record) -> Result<i64> {
        self.check_shape(record)?;

        let key_column = match self.schema.key_column() {
            Some(key_column) => key_column.to_string(),
            None => {
                return Err(EngineError::ForbiddenOperation {
                    table: self.schema.name.clone(),
                    reason: "relation table entries cannot be modified".to_string(),
                });
            }
        };

        let key = self.key_of(record, &key_column)?;
        let index = self.find_key(key, &key_column).ok_or_else(|| {
            EngineError::EntryNotFound {
                table: self.schema.name.clone(),
                entry: key.to_string(),
            }
        })?;

        let row = self.normalize(record);
        for column in &self.schema.columns {
            if column != &key_column {
                let value = row.get(column).cloned().unwrap_or(Value::Null);
                self.rows[index].set(column.clone(), value);
            }
        }
        Ok(key)
    }

    /// Remove the row addressed by the record: by key for keyed tables, by
    /// full value-tuple for relation tables. Returns the removed key, or
    /// [`NO_KEY`] for relation tables.
    pub fn delete_entry(&mut self, record: &Record) -> Result<i64> {
        let index = self.locate(record)?;
        let removed = self.rows.remove(index);
        let key = self
            .schema
            .key_column()
            .and_then(|key_column| removed.get(key_column))
            .and_then(Value::as_key)
            .unwrap_or(NO_KEY);
        Ok(key)
    }

    /// Validate shape and existence for the record, returning the position
    /// of the row it addresses. This is the non-mutating half of a delete;
    /// the connector uses it to confirm the primary row before cascading.
    pub fn locate(&self, record: &Record) -> Result<usize> {
        self.check_shape(record)?;

        if let Some(key_column) = self.schema.key_column() {
            let key = self.key_of(record, key_column)?;
            self.find_key(key, key_column)
                .ok_or_else(|| EngineError::EntryNotFound {
                    table: self.schema.name.clone(),
                    entry: key.to_string(),
                })
        } else {
            let row = self.normalize(record);
            self.rows
                .iter()
                .position(|existing| existing == &row)
                .ok_or_else(|| EngineError::EntryNotFound {
                    table: self.schema.name.clone(),
                    entry: row.to_string(),
                })
        }
    }

    /// All rows whose value in `column` is a member of `values`,
    /// order-preserving. Unknown columns fail; zero matches do not.
    pub fn lookup_by_column(&self, column: &str, values: &[Value]) -> Result<Vec<Record>> {
        if !self.schema.has_column(column) {
            return Err(EngineError::UnknownColumn {
                table: self.schema.name.clone(),
                column: column.to_string(),
            });
        }
        Ok(self
            .rows
            .iter()
            .filter(|row| row.get(column).map_or(false, |v| values.contains(v)))
            .cloned()
            .collect())
    }

    fn check_shape(&self, record: &Record) -> Result<()> {
        if record.matches_columns(&self.schema.columns) {
            Ok(())
        } else {
            Err(EngineError::DataMismatch(format!(
                "record columns [{}] do not match table '{}' columns [{}]",
                record.columns().collect::<Vec<_>>().join(", "),
                self.schema.name,
                self.schema.columns.join(", ")
            )))
        }
    }

    /// Rebuild the record in declared column order. Only called after the
    /// shape check, so every declared column is present.
    fn normalize(&self, record: &Record) -> Record {
        Record::from_pairs(
            self.schema
                .columns
                .iter()
                .map(|column| {
                    (
                        column.clone(),
                        record.get(column).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect(),
        )
    }

    /// Read the synthetic key out of a caller record. A key that cannot
    /// coerce to an integer matches no row.
    fn key_of(&self, record: &Record, key_column: &str) -> Result<i64> {
        record
            .get(key_column)
            .and_then(Value::as_key)
            .ok_or_else(|| EngineError::EntryNotFound {
                table: self.schema.name.clone(),
                entry: record
                    .get(key_column)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            })
    }

    fn find_key(&self, key: i64, key_column: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(key_column).and_then(Value::as_key) == Some(key))
    }
}

fn next_key(rows: &[Record], key_column: &str) -> i64 {
    rows.iter()
        .filter_map(|row| row.get(key_column).and_then(Value::as_key))
        .max()
        .map(|max| max + 1)
        .unwrap_or(0)
}
