//! Backing store access
//!
//! This module wraps the single SQLite connection behind whole-table
//! primitives: existence check, full read, fresh create and full replace.
//! The staged tables never touch SQL themselves; they call these primitives
//! on explicit load/persist and the declared column types drive the
//! physical column typing.

use crate::error::{EngineError, Result};
use crate::models::{Record, Value};
use crate::schema::TableSchema;
use log::debug;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;

/// Handle to the SQLite store shared by all staged tables
pub struct TableStore {
    conn: Connection,
}

impl TableStore {
    /// Open (or create) the store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!("opened store at {}", path.display());
        Ok(TableStore { conn })
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Result<Self> {
        Ok(TableStore {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Returns true if the physical table exists in the store
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Read all rows of the table, in stored order.
    ///
    /// Fails with [`EngineError::TableAbsent`] when the physical table does
    /// not exist; the caller decides whether that is recoverable.
    pub fn read_table(&self, schema: &TableSchema) -> Result<Vec<Record>> {
        if !self.table_exists(&schema.name)? {
            return Err(EngineError::TableAbsent(schema.name.clone()));
        }

        let sql = format!(
            "SELECT {} FROM \"{}\"",
            quoted_column_list(&schema.columns),
            schema.name
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raw_rows = stmt
            .query_map([], |row| {
                (0..schema.columns.len())
                    .map(|i| row.get::<_, rusqlite::types::Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let mut record = Record::new();
            for (column, value) in schema.columns.iter().zip(raw) {
                record.set(column.clone(), from_sql_value(value, &schema.name, column)?);
            }
            records.push(record);
        }

        debug!("read {} rows from '{}'", records.len(), schema.name);
        Ok(records)
    }

    /// Create the physical table with the schema's columns.
    ///
    /// Fails if the table already exists; used only when provisioning a
    /// freshly declared table.
    pub fn create_table(&mut self, schema: &TableSchema) -> Result<()> {
        self.conn.execute(&create_sql(schema), [])?;
        debug!("created table '{}'", schema.name);
        Ok(())
    }

    /// Replace the physical table's contents with the given rows.
    ///
    /// The table is dropped and re-created so the declared column types
    /// always apply, then the rows are bulk-inserted inside one store-level
    /// transaction. Atomic per table; nothing spans tables.
    pub fn replace_table(&mut self, schema: &TableSchema, rows: &[Record]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS \"{}\"", schema.name), [])?;
        tx.execute(&create_sql(schema), [])?;

        {
            let placeholders = (1..=schema.columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO \"{}\" ({}) VALUES ({})",
                schema.name,
                quoted_column_list(&schema.columns),
                placeholders
            );
            let mut stmt = tx.prepare(&sql)?;
            for record in rows {
                let values = schema
                    .columns
                    .iter()
                    .map(|column| to_sql_value(record.get(column).unwrap_or(&Value::Null)));
                stmt.execute(params_from_iter(values))?;
            }
        }

        tx.commit()?;
        debug!("replaced '{}' with {} rows", schema.name, rows.len());
        Ok(())
    }
}

fn quoted_column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn create_sql(schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|column| {
            let sql_type = if schema.table_keys.contains(column) {
                // synthetic keys persist as an explicit integer column
                "INTEGER"
            } else {
                schema
                    .column_types
                    .get(column)
                    .map(|t| t.sql_type())
                    .unwrap_or("TEXT")
            };
            format!("\"{}\" {}", column, sql_type)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE \"{}\" ({})", schema.name, columns)
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Int(v) => rusqlite::types::Value::Integer(*v),
        Value::Float(v) => rusqlite::types::Value::Real(*v),
        Value::Text(v) => rusqlite::types::Value::Text(v.clone()),
    }
}

fn from_sql_value(value: rusqlite::types::Value, table: &str, column: &str) -> Result<Value> {
    match value {
        rusqlite::types::Value::Null => Ok(Value::Null),
        rusqlite::types::Value::Integer(v) => Ok(Value::Int(v)),
        rusqlite::types::Value::Real(v) => Ok(Value::Float(v)),
        rusqlite::types::Value::Text(v) => Ok(Value::Text(v)),
        rusqlite::types::Value::Blob(_) => Err(EngineError::DataMismatch(format!(
            "unexpected BLOB in column '{}' of table '{}'",
            column, table
        ))),
    }
}
