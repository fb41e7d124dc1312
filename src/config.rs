//! Configuration for the engine
//!
//! This module provides the construction parameters for the database
//! connector: where the SQLite store lives and which schema definition
//! resource describes its tables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the SQLite database file (created on first use)
    pub database_path: PathBuf,

    /// Path to the XML table-definition resource
    pub schema_path: PathBuf,
}

impl EngineConfig {
    /// Create a configuration from explicit paths
    pub fn new(database_path: impl Into<PathBuf>, schema_path: impl Into<PathBuf>) -> Self {
        EngineConfig {
            database_path: database_path.into(),
            schema_path: schema_path.into(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("data/plan.db"),
            schema_path: PathBuf::from("data/db_def.xml"),
        }
    }
}
