//! Schema catalog loader
//!
//! Reads the XML table-definition resource into a catalog of
//! [`TableSchema`] values. The translation is pure and idempotent: the same
//! resource always yields the same catalog, and nothing outside the
//! returned map is touched.
//!
//! Expected document shape:
//!
//! ```xml
//! <DATABASE>
//!   <TABLE NAME="EXERCISE" TYPE="MAIN">
//!     <COLUMN TYPE="ID">ID</COLUMN>
//!     <COLUMN TYPE="TEXT">NAME</COLUMN>
//!     <RELATION KEY="EXERCISE_ID">EXERCISE_CATEGORY</RELATION>
//!   </TABLE>
//!   <TABLE NAME="EXERCISE_CATEGORY" TYPE="RELATION" TOP="EXERCISE">
//!     <COLUMN TYPE="INT" RELATION="EXERCISE">EXERCISE_ID</COLUMN>
//!     <COLUMN TYPE="INT" RELATION="CATEGORY">CATEGORY_ID</COLUMN>
//!   </TABLE>
//! </DATABASE>
//! ```

use super::{ColumnType, TableKind, TableRelation, TableSchema};
use crate::error::{EngineError, Result};
use log::{debug, info, warn};
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Load the schema catalog from an XML resource on disk
pub fn load_catalog(path: &Path) -> Result<HashMap<String, Arc<TableSchema>>> {
    let text = fs::read_to_string(path)?;
    let catalog = parse_catalog(&text)?;
    info!(
        "loaded schema catalog from {} ({} tables)",
        path.display(),
        catalog.len()
    );
    Ok(catalog)
}

/// Parse the schema catalog out of the XML text
pub(crate) fn parse_catalog(text: &str) -> Result<HashMap<String, Arc<TableSchema>>> {
    let document = Document::parse(text)?;
    let mut catalog = HashMap::new();

    for node in document.root_element().children() {
        if !node.is_element() {
            continue;
        }
        if node.tag_name().name() != "TABLE" {
            return Err(EngineError::MalformedSchema(format!(
                "unexpected element '{}' at catalog level, expected TABLE",
                node.tag_name().name()
            )));
        }

        let schema = parse_table(&node)?;
        debug!(
            "parsed table '{}' ({:?}, {} columns, {} relations)",
            schema.name,
            schema.kind,
            schema.columns.len(),
            schema.table_relations.len()
        );
        if catalog
            .insert(schema.name.clone(), Arc::new(schema))
            .is_some()
        {
            return Err(EngineError::MalformedSchema(
                "duplicate table declaration".to_string(),
            ));
        }
    }

    Ok(catalog)
}

fn parse_table(node: &Node<'_, '_>) -> Result<TableSchema> {
    let name = required_attribute(node, "NAME")?;
    check_identifier(&name)?;
    let kind = parse_kind(&required_attribute(node, "TYPE")?, &name)?;

    let top_table = node.attribute("TOP").map(str::to_string);
    match kind {
        TableKind::Relation if top_table.is_none() => {
            return Err(EngineError::MalformedSchema(format!(
                "relation table '{}' is missing its TOP attribute",
                name
            )));
        }
        TableKind::Main | TableKind::Sub if top_table.is_some() => {
            warn!("table '{}' declares TOP but is not a relation table", name);
        }
        _ => {}
    }
    let top_table = if kind == TableKind::Relation {
        top_table
    } else {
        None
    };

    let mut columns = Vec::new();
    let mut column_types = HashMap::new();
    let mut column_relations = HashMap::new();
    let mut table_relations = Vec::new();
    let mut table_keys = Vec::new();

    for child in node.children() {
        if !child.is_element() {
            continue;
        }
        match child.tag_name().name() {
            "COLUMN" => {
                let column = element_text(&child, &name, "COLUMN")?;
                check_identifier(&column)?;
                let declared_type = required_attribute(&child, "TYPE")?;
                if declared_type == "ID" {
                    // synthetic key column: no store type, no relation target
                    table_keys.push(column.clone());
                } else {
                    column_types.insert(column.clone(), parse_column_type(&declared_type, &name)?);
                    column_relations.insert(
                        column.clone(),
                        child.attribute("RELATION").unwrap_or("").to_string(),
                    );
                }
                columns.push(column);
            }
            "RELATION" => {
                let target = element_text(&child, &name, "RELATION")?;
                let key_column = required_attribute(&child, "KEY")?;
                table_relations.push(TableRelation {
                    table: target,
                    key_column,
                });
            }
            other => {
                return Err(EngineError::MalformedSchema(format!(
                    "unexpected element '{}' in table '{}', expected COLUMN or RELATION",
                    other, name
                )));
            }
        }
    }

    TableSchema::new(
        name,
        columns,
        column_types,
        column_relations,
        table_relations,
        table_keys,
        kind,
        top_table,
    )
}

fn parse_kind(value: &str, table: &str) -> Result<TableKind> {
    match value {
        "MAIN" => Ok(TableKind::Main),
        "SUB" => Ok(TableKind::Sub),
        "RELATION" => Ok(TableKind::Relation),
        other => Err(EngineError::MalformedSchema(format!(
            "table '{}' declares unknown kind '{}'",
            table, other
        ))),
    }
}

fn parse_column_type(value: &str, table: &str) -> Result<ColumnType> {
    match value {
        "INT" | "INTEGER" => Ok(ColumnType::Integer),
        "FLOAT" | "REAL" => Ok(ColumnType::Float),
        "TEXT" => Ok(ColumnType::Text),
        "TIME" => Ok(ColumnType::Time),
        other => Err(EngineError::MalformedSchema(format!(
            "table '{}' declares unknown column type '{}'",
            table, other
        ))),
    }
}

fn required_attribute(node: &Node<'_, '_>, attribute: &str) -> Result<String> {
    node.attribute(attribute)
        .map(str::to_string)
        .ok_or_else(|| {
            EngineError::MalformedSchema(format!(
                "element '{}' is missing its {} attribute",
                node.tag_name().name(),
                attribute
            ))
        })
}

fn element_text(node: &Node<'_, '_>, table: &str, element: &str) -> Result<String> {
    let text = node.text().map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Err(EngineError::MalformedSchema(format!(
            "empty {} element in table '{}'",
            element, table
        )));
    }
    Ok(text.to_string())
}

/// Table and column names end up quoted in SQL statements, so restrict them
/// to plain identifiers at parse time.
fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EngineError::MalformedSchema(format!(
            "invalid identifier '{}'",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEF: &str = r#"
        <DATABASE>
          <TABLE NAME="EXERCISE" TYPE="MAIN">
            <COLUMN TYPE="ID">ID</COLUMN>
            <COLUMN TYPE="TEXT">NAME</COLUMN>
            <COLUMN TYPE="TIME">DURATION</COLUMN>
            <RELATION KEY="EXERCISE_ID">EXERCISE_CATEGORY</RELATION>
          </TABLE>
          <TABLE NAME="CATEGORY" TYPE="SUB">
            <COLUMN TYPE="ID">ID</COLUMN>
            <COLUMN TYPE="TEXT">NAME</COLUMN>
            <RELATION KEY="CATEGORY_ID">EXERCISE_CATEGORY</RELATION>
          </TABLE>
          <TABLE NAME="EXERCISE_CATEGORY" TYPE="RELATION" TOP="EXERCISE">
            <COLUMN TYPE="INT" RELATION="EXERCISE">EXERCISE_ID</COLUMN>
            <COLUMN TYPE="INT" RELATION="CATEGORY">CATEGORY_ID</COLUMN>
          </TABLE>
        </DATABASE>
    "#;

    #[test]
    fn test_parse_full_catalog() {
        let catalog = parse_catalog(DEF).unwrap();
        assert_eq!(catalog.len(), 3);

        let exercise = &catalog["EXERCISE"];
        assert_eq!(exercise.kind, TableKind::Main);
        assert_eq!(exercise.columns, vec!["ID", "NAME", "DURATION"]);
        assert_eq!(exercise.table_keys, vec!["ID"]);
        assert!(!exercise.column_types.contains_key("ID"));
        assert_eq!(exercise.column_types["NAME"], ColumnType::Text);
        assert_eq!(exercise.column_types["DURATION"], ColumnType::Time);
        assert_eq!(
            exercise.table_relations,
            vec![TableRelation {
                table: "EXERCISE_CATEGORY".to_string(),
                key_column: "EXERCISE_ID".to_string(),
            }]
        );
        // non-key columns without a RELATION attribute record an empty target
        assert_eq!(exercise.column_relations["NAME"], "");

        let relation = &catalog["EXERCISE_CATEGORY"];
        assert_eq!(relation.kind, TableKind::Relation);
        assert!(relation.table_keys.is_empty());
        assert_eq!(relation.top_table.as_deref(), Some("EXERCISE"));
        assert_eq!(relation.column_relations["EXERCISE_ID"], "EXERCISE");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse_catalog(DEF).unwrap();
        let second = parse_catalog(DEF).unwrap();
        assert_eq!(first.len(), second.len());
        for (name, schema) in &first {
            assert_eq!(second[name].columns, schema.columns);
            assert_eq!(second[name].table_keys, schema.table_keys);
        }
    }

    #[test]
    fn test_unknown_child_element_is_fatal() {
        let def = r#"
            <DATABASE>
              <TABLE NAME="EXERCISE" TYPE="MAIN">
                <COLUMN TYPE="ID">ID</COLUMN>
                <INDEX>NAME</INDEX>
              </TABLE>
            </DATABASE>
        "#;
        assert!(matches!(
            parse_catalog(def),
            Err(EngineError::MalformedSchema(_))
        ));
    }

    #[test]
    fn test_unknown_kind_is_fatal() {
        let def = r#"
            <DATABASE>
              <TABLE NAME="EXERCISE" TYPE="LOOKUP">
                <COLUMN TYPE="ID">ID</COLUMN>
              </TABLE>
            </DATABASE>
        "#;
        assert!(matches!(
            parse_catalog(def),
            Err(EngineError::MalformedSchema(_))
        ));
    }

    #[test]
    fn test_unknown_column_type_is_fatal() {
        let def = r#"
            <DATABASE>
              <TABLE NAME="EXERCISE" TYPE="MAIN">
                <COLUMN TYPE="BLOB">DATA</COLUMN>
              </TABLE>
            </DATABASE>
        "#;
        assert!(matches!(
            parse_catalog(def),
            Err(EngineError::MalformedSchema(_))
        ));
    }

    #[test]
    fn test_relation_table_requires_top() {
        let def = r#"
            <DATABASE>
              <TABLE NAME="EXERCISE_CATEGORY" TYPE="RELATION">
                <COLUMN TYPE="INT" RELATION="EXERCISE">EXERCISE_ID</COLUMN>
              </TABLE>
            </DATABASE>
        "#;
        assert!(matches!(
            parse_catalog(def),
            Err(EngineError::MalformedSchema(_))
        ));
    }

    #[test]
    fn test_duplicate_table_is_fatal() {
        let def = r#"
            <DATABASE>
              <TABLE NAME="EXERCISE" TYPE="MAIN">
                <COLUMN TYPE="ID">ID</COLUMN>
              </TABLE>
              <TABLE NAME="EXERCISE" TYPE="MAIN">
                <COLUMN TYPE="ID">ID</COLUMN>
              </TABLE>
            </DATABASE>
        "#;
        assert!(matches!(
            parse_catalog(def),
            Err(EngineError::MalformedSchema(_))
        ));
    }

    #[test]
    fn test_invalid_xml_is_a_parse_error() {
        assert!(matches!(
            parse_catalog("<DATABASE><TABLE"),
            Err(EngineError::SchemaParse(_))
        ));
    }
}
