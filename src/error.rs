//! Error types for the engine
//!
//! This module provides the consolidated error type raised by the schema
//! loader, the staged tables and the database connector. Every failure is
//! surfaced synchronously as a typed variant for the caller to translate
//! into a user-facing message; the engine performs no retries.

use std::io;
use thiserror::Error;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation referenced a table name absent from the schema catalog
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Lookup referenced a column not declared for the table
    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn {
        /// Table the lookup ran against
        table: String,
        /// The undeclared column name
        column: String,
    },

    /// Relation lookup between two tables found no declared join
    #[error("No relation declared from table '{source_table}' to table '{target}'")]
    UnknownRelation {
        /// Table whose relations were searched
        source_table: String,
        /// Requested relation target
        target: String,
    },

    /// A record's column set does not match the table's declared columns,
    /// or an entry builder was given the wrong number of values, or a
    /// relation lookup matched more than one declared join
    #[error("Data mismatch: {0}")]
    DataMismatch(String),

    /// Modify/delete targeted a key or value-tuple absent from the table
    #[error("Entry not found in table '{table}': {entry}")]
    EntryNotFound {
        /// Table the operation targeted
        table: String,
        /// Key or value-tuple that was not found
        entry: String,
    },

    /// Add targeted a value-tuple already present in a relation table
    #[error("Entry already exists in relation table '{0}'")]
    DuplicateKey(String),

    /// Modify attempted on a relation table
    #[error("Forbidden operation on table '{table}': {reason}")]
    ForbiddenOperation {
        /// Table the operation targeted
        table: String,
        /// Why the operation is not allowed
        reason: String,
    },

    /// The schema resource is structurally invalid (fatal at startup)
    #[error("Malformed schema definition: {0}")]
    MalformedSchema(String),

    /// The physical table does not exist in the backing store.
    /// Recoverable: the staged table constructor provisions an empty table.
    #[error("Table '{0}' does not exist in the store")]
    TableAbsent(String),

    /// SQLite error from the backing store
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// I/O error while reading the schema resource
    #[error("Schema resource error: {0}")]
    SchemaRead(#[from] io::Error),

    /// XML syntax error in the schema resource
    #[error("Schema resource is not valid XML: {0}")]
    SchemaParse(#[from] roxmltree::Error),
}

/// Result type for the engine
pub type Result<T> = std::result::Result<T, EngineError>;
