//! # PlanDB
//!
//! Schema-driven staged table engine for a workout plan record manager.
//!
//! The engine sits between an embedded SQLite store and the in-memory
//! working copy a desktop UI edits: it loads a table catalog from an XML
//! definition, stages one mutable working copy per table, enforces key and
//! relation integrity without a SQL query engine, cascades deletes through
//! declared relations, and commits or rolls back the working set against
//! the store on request.
//!
//! ```no_run
//! use plandb::{DatabaseConnector, EngineConfig, Value};
//!
//! # fn main() -> plandb::Result<()> {
//! let config = EngineConfig::new("data/plan.db", "data/db_def.xml");
//! let mut connector = DatabaseConnector::open(&config)?;
//!
//! let entry = connector.build_entry_for_table(
//!     "EXERCISE",
//!     vec![
//!         Value::from(""),
//!         Value::from("Squat"),
//!         Value::from("Barbell back squat"),
//!         Value::from("00:10:00"),
//!         Value::from("http://example.org/squat"),
//!     ],
//! )?;
//! let id = connector.add_entry_to_table("EXERCISE", &entry)?;
//! connector.commit_changes(Some("EXERCISE"))?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod connector;
pub mod error;
pub mod models;
pub mod schema;
pub mod staging;
pub mod store;

/// Re-export common types for ease of use
pub use config::EngineConfig;
pub use connector::DatabaseConnector;
pub use error::{EngineError, Result};
pub use models::{Record, Value};
pub use schema::{load_catalog, ColumnType, TableKind, TableRelation, TableSchema};
pub use staging::{StagedTable, NO_KEY};
pub use store::TableStore;
