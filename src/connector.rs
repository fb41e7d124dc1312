//! Database connector
//!
//! This module provides the engine's entry point: the owner of the store
//! handle and of one staged table per declared schema table. Single-table
//! mutations are delegated to the staged tables; everything that spans
//! tables lives here: record builders, cascading deletes through declared
//! relations, relation lookups and whole-store commit/rollback.
//!
//! The connector is an explicitly constructed value. The caller builds it
//! once from an [`EngineConfig`] and passes it to whoever needs it; there
//! is no hidden global instance.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{Record, Value};
use crate::schema::{load_catalog, TableKind, TableRelation};
use crate::staging::StagedTable;
use crate::store::TableStore;
use log::{debug, info};
use std::collections::HashMap;

/// Owner of the backing store and of all staged tables
pub struct DatabaseConnector {
    store: TableStore,
    tables: HashMap<String, StagedTable>,
}

impl DatabaseConnector {
    /// Open the store, load the schema catalog and stage every declared
    /// table, provisioning empty physical tables as needed.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let mut store = TableStore::open(&config.database_path)?;
        let catalog = load_catalog(&config.schema_path)?;

        let mut names: Vec<&String> = catalog.keys().collect();
        names.sort();

        let mut tables = HashMap::new();
        for name in names {
            let table = StagedTable::load(catalog[name].clone(), &mut store)?;
            tables.insert(name.clone(), table);
        }

        info!(
            "connector ready: {} at {} ({} tables)",
            config.schema_path.display(),
            config.database_path.display(),
            tables.len()
        );
        Ok(DatabaseConnector { store, tables })
    }

    /// Declared table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Defensive copy of the named table's current working rows. Key
    /// columns appear as ordinary columns of every record.
    pub fn get_table_content(&self, name: &str) -> Result<Vec<Record>> {
        Ok(self.table(name)?.snapshot())
    }

    /// The table's declared columns, in order
    pub fn get_table_columns(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.table(name)?.schema().columns.clone())
    }

    /// The table's declared relations, in declaration order
    pub fn get_table_relations(&self, name: &str) -> Result<Vec<TableRelation>> {
        Ok(self.table(name)?.schema().table_relations.clone())
    }

    /// The table's column-to-referenced-table map
    pub fn get_column_relations(&self, name: &str) -> Result<HashMap<String, String>> {
        Ok(self.table(name)?.schema().column_relations.clone())
    }

    /// Content snapshot of every relation table declared against `name`,
    /// keyed by relation-table name. Used by the presentation layer to fill
    /// relation widgets next to a main form.
    pub fn relation_table_contents(&self, name: &str) -> Result<HashMap<String, Vec<Record>>> {
        let relations = self.table(name)?.schema().table_relations.clone();
        let mut contents = HashMap::new();
        for relation in relations {
            let rows = self.table(&relation.table)?.snapshot();
            contents.insert(relation.table, rows);
        }
        Ok(contents)
    }

    /// Zip ordered values against the table's declared columns
    pub fn build_entry_for_table(&self, name: &str, values: Vec<Value>) -> Result<Record> {
        let columns = &self.table(name)?.schema().columns;
        if values.len() != columns.len() {
            return Err(EngineError::DataMismatch(format!(
                "table '{}' expects {} values, got {}",
                name,
                columns.len(),
                values.len()
            )));
        }
        Ok(Record::from_pairs(
            columns.iter().cloned().zip(values).collect(),
        ))
    }

    /// Build an entry for a relation table from a by-column-name map.
    /// Every declared column must be present and the map must not carry
    /// extra entries.
    pub fn build_entry_for_relation_table(
        &self,
        name: &str,
        values_by_column: &HashMap<String, Value>,
    ) -> Result<Record> {
        let columns = &self.table(name)?.schema().columns;
        if values_by_column.len() != columns.len() {
            return Err(EngineError::DataMismatch(format!(
                "table '{}' expects {} values, got {}",
                name,
                columns.len(),
                values_by_column.len()
            )));
        }
        let mut pairs = Vec::with_capacity(columns.len());
        for column in columns {
            let value = values_by_column.get(column).ok_or_else(|| {
                EngineError::DataMismatch(format!(
                    "missing value for column '{}' of table '{}'",
                    column, name
                ))
            })?;
            pairs.push((column.clone(), value.clone()));
        }
        Ok(Record::from_pairs(pairs))
    }

    /// Add an entry to the named table; returns the assigned key (or the
    /// positional index for relation tables)
    pub fn add_entry_to_table(&mut self, name: &str, entry: &Record) -> Result<i64> {
        self.table_mut(name)?.add_entry(entry)
    }

    /// Modify the entry addressed by the record's key in the named table
    pub fn modify_entry_in_table(&mut self, name: &str, entry: &Record) -> Result<i64> {
        self.table_mut(name)?.modify_entry(entry)
    }

    /// Delete an entry, cascading through declared relations first.
    ///
    /// The primary entry is validated (shape and existence) before any
    /// relation row is touched, so a doomed delete cannot strand
    /// half-applied cascade deletions. Then every row of every declared
    /// relation table whose join-key column equals the entry's key is
    /// removed, and finally the entry itself. Returns the deleted key, or
    /// the sentinel for relation tables.
    pub fn delete_entry_from_table(&mut self, name: &str, entry: &Record) -> Result<i64> {
        let (relations, key) = {
            let table = self.table(name)?;
            table.locate(entry)?;
            let key = table
                .schema()
                .key_column()
                .and_then(|key_column| entry.get(key_column))
                .and_then(Value::as_key);
            (table.schema().table_relations.clone(), key)
        };

        // relation tables have no key, nothing can reference their rows
        if let Some(key) = key {
            for relation in &relations {
                let related = self.table_mut(&relation.table)?;
                let dependents =
                    related.lookup_by_column(&relation.key_column, &[Value::Int(key)])?;
                for dependent in &dependents {
                    related.delete_entry(dependent)?;
                }
                if !dependents.is_empty() {
                    debug!(
                        "cascade: removed {} rows from '{}' for {}={}",
                        dependents.len(),
                        relation.table,
                        relation.key_column,
                        key
                    );
                }
            }
        }

        self.table_mut(name)?.delete_entry(entry)
    }

    /// All rows of the named table whose value in `column` is a member of
    /// `values`
    pub fn lookup_entry_in_table(
        &self,
        name: &str,
        column: &str,
        values: &[Value],
    ) -> Result<Vec<Record>> {
        self.table(name)?.lookup_by_column(column, values)
    }

    /// Look up `search_table` through the relation `source_table` declares
    /// against it: rows whose join-key column value is a member of
    /// `values`. No declared relation is an error; more than one is a
    /// schema defect.
    pub fn lookup_table_by_relation(
        &self,
        values: &[Value],
        source_table: &str,
        search_table: &str,
    ) -> Result<Vec<Record>> {
        let source = self.table(source_table)?;
        let matches: Vec<&TableRelation> = source
            .schema()
            .table_relations
            .iter()
            .filter(|relation| relation.table == search_table)
            .collect();

        match matches.as_slice() {
            [] => Err(EngineError::UnknownRelation {
                source_table: source_table.to_string(),
                target: search_table.to_string(),
            }),
            [relation] => self
                .table(search_table)?
                .lookup_by_column(&relation.key_column, values),
            _ => Err(EngineError::DataMismatch(format!(
                "table '{}' declares {} relations to '{}'",
                source_table,
                matches.len(),
                search_table
            ))),
        }
    }

    /// Persist one table (or every table when `name` is `None`) to the
    /// backing store. Tables are flushed one at a time in sorted-name
    /// order; there is no atomicity across tables, so a failure leaves the
    /// already-flushed tables committed.
    pub fn commit_changes(&mut self, name: Option<&str>) -> Result<()> {
        let names = match name {
            Some(name) => vec![name.to_string()],
            None => self.table_names(),
        };
        for name in &names {
            let table = self
                .tables
                .get(name)
                .ok_or_else(|| EngineError::UnknownTable(name.clone()))?;
            table.persist(&mut self.store, true)?;
        }
        info!("committed {} table(s)", names.len());
        Ok(())
    }

    /// Reload one table (or every table when `name` is `None`) from the
    /// backing store, discarding in-memory edits
    pub fn rollback_changes(&mut self, name: Option<&str>) -> Result<()> {
        let names = match name {
            Some(name) => vec![name.to_string()],
            None => self.table_names(),
        };
        for name in &names {
            let table = self
                .tables
                .get_mut(name)
                .ok_or_else(|| EngineError::UnknownTable(name.clone()))?;
            table.reload(&self.store)?;
        }
        info!("rolled back {} table(s)", names.len());
        Ok(())
    }

    /// Returns true if the named table is a MAIN table
    pub fn is_main_table(&self, name: &str) -> Result<bool> {
        Ok(self.table(name)?.schema().kind == TableKind::Main)
    }

    /// Returns true if the named table is a SUB table
    pub fn is_sub_table(&self, name: &str) -> Result<bool> {
        Ok(self.table(name)?.schema().kind == TableKind::Sub)
    }

    /// Returns true if the named table is a RELATION table
    pub fn is_relation_table(&self, name: &str) -> Result<bool> {
        Ok(self.table(name)?.schema().kind == TableKind::Relation)
    }

    /// Returns true if the relation table declares `candidate` as its
    /// owning side
    pub fn is_top_table(&self, relation_table: &str, candidate: &str) -> Result<bool> {
        Ok(self.table(relation_table)?.schema().top_table.as_deref() == Some(candidate))
    }

    /// The column joining the named table into its declared top table, if
    /// the table declares one
    pub fn top_table_key(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .table(name)?
            .schema()
            .top_table_key()
            .map(str::to_string))
    }

    fn table(&self, name: &str) -> Result<&StagedTable> {
        self.tables
            .get(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut StagedTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))
    }
}
