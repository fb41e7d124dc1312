//! Integration tests running the whole engine against a SQLite file store
//! and the workout schema fixture.

use plandb::{DatabaseConnector, EngineConfig, EngineError, Record, Value, NO_KEY};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const DB_DEF: &str = include_str!("fixtures/db_def.xml");

fn setup(dir: &TempDir) -> EngineConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    let schema_path = dir.path().join("db_def.xml");
    fs::write(&schema_path, DB_DEF).unwrap();
    EngineConfig::new(dir.path().join("test.db"), schema_path)
}

fn open(dir: &TempDir) -> DatabaseConnector {
    DatabaseConnector::open(&setup(dir)).unwrap()
}

fn exercise_values(id: Value, name: &str) -> Vec<Value> {
    vec![
        id,
        Value::from(name),
        Value::from("Desc"),
        Value::from("00:00:00"),
        Value::from("http://x"),
    ]
}

fn add_exercise(connector: &mut DatabaseConnector, name: &str) -> i64 {
    let entry = connector
        .build_entry_for_table("EXERCISE", exercise_values(Value::from(""), name))
        .unwrap();
    connector.add_entry_to_table("EXERCISE", &entry).unwrap()
}

fn relation_entry(
    connector: &DatabaseConnector,
    table: &str,
    values: &[(&str, i64)],
) -> Record {
    let by_column: HashMap<String, Value> = values
        .iter()
        .map(|(column, value)| (column.to_string(), Value::Int(*value)))
        .collect();
    connector
        .build_entry_for_relation_table(table, &by_column)
        .unwrap()
}

#[test]
fn exercise_scenario() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    // first add into an empty table assigns key 0
    let first = add_exercise(&mut connector, "Test");
    assert_eq!(first, 0);
    let content = connector.get_table_content("EXERCISE").unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0].get("ID"), Some(&Value::Int(0)));

    // second add assigns key 1
    let second = add_exercise(&mut connector, "Second");
    assert_eq!(second, 1);

    // modify renames row 0 in place
    let renamed = connector
        .build_entry_for_table("EXERCISE", exercise_values(Value::Int(0), "Renamed"))
        .unwrap();
    assert_eq!(
        connector.modify_entry_in_table("EXERCISE", &renamed).unwrap(),
        0
    );
    let hits = connector
        .lookup_entry_in_table("EXERCISE", "ID", &[Value::Int(0)])
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get("NAME"), Some(&Value::from("Renamed")));

    // delete row 1, leaving only row 0
    let doomed = connector
        .build_entry_for_table("EXERCISE", exercise_values(Value::Int(1), "Second"))
        .unwrap();
    connector.delete_entry_from_table("EXERCISE", &doomed).unwrap();
    let content = connector.get_table_content("EXERCISE").unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0].get("ID"), Some(&Value::Int(0)));
}

#[test]
fn add_lookup_delete_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    let key = add_exercise(&mut connector, "Test Squat");
    let hits = connector
        .lookup_entry_in_table("EXERCISE", "ID", &[Value::Int(key)])
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get("NAME"), Some(&Value::from("Test Squat")));
    assert_eq!(hits[0].get("ID"), Some(&Value::Int(key)));

    let entry = connector
        .build_entry_for_table("EXERCISE", exercise_values(Value::Int(key), "Test Squat"))
        .unwrap();
    assert_eq!(
        connector.delete_entry_from_table("EXERCISE", &entry).unwrap(),
        key
    );
    let hits = connector
        .lookup_entry_in_table("EXERCISE", "ID", &[Value::Int(key)])
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn relation_duplicate_add_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    let entry = relation_entry(
        &connector,
        "EXERCISE_CATEGORY",
        &[("EXERCISE_ID", 0), ("CATEGORY_ID", 0)],
    );
    let index = connector
        .add_entry_to_table("EXERCISE_CATEGORY", &entry)
        .unwrap();
    assert_eq!(index, 0);

    let result = connector.add_entry_to_table("EXERCISE_CATEGORY", &entry);
    assert!(matches!(result, Err(EngineError::DuplicateKey(_))));
    assert_eq!(
        connector.get_table_content("EXERCISE_CATEGORY").unwrap().len(),
        1
    );
}

#[test]
fn relation_modify_is_forbidden() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    let entry = relation_entry(
        &connector,
        "EXERCISE_CATEGORY",
        &[("EXERCISE_ID", 0), ("CATEGORY_ID", 0)],
    );
    let result = connector.modify_entry_in_table("EXERCISE_CATEGORY", &entry);
    assert!(matches!(result, Err(EngineError::ForbiddenOperation { .. })));
}

#[test]
fn relation_delete_returns_sentinel() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    let entry = relation_entry(
        &connector,
        "EXERCISE_CATEGORY",
        &[("EXERCISE_ID", 3), ("CATEGORY_ID", 7)],
    );
    connector
        .add_entry_to_table("EXERCISE_CATEGORY", &entry)
        .unwrap();
    assert_eq!(
        connector
            .delete_entry_from_table("EXERCISE_CATEGORY", &entry)
            .unwrap(),
        NO_KEY
    );
}

#[test]
fn rollback_restores_last_persisted_rows() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    add_exercise(&mut connector, "Committed");
    connector.commit_changes(Some("EXERCISE")).unwrap();
    let committed = connector.get_table_content("EXERCISE").unwrap();

    // dirty edits of all three flavors
    add_exercise(&mut connector, "Dirty add");
    let renamed = connector
        .build_entry_for_table("EXERCISE", exercise_values(Value::Int(0), "Dirty rename"))
        .unwrap();
    connector.modify_entry_in_table("EXERCISE", &renamed).unwrap();

    connector.rollback_changes(Some("EXERCISE")).unwrap();
    assert_eq!(connector.get_table_content("EXERCISE").unwrap(), committed);
}

#[test]
fn whole_store_rollback_discards_everything_uncommitted() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    add_exercise(&mut connector, "Squat");
    let entry = relation_entry(
        &connector,
        "EXERCISE_CATEGORY",
        &[("EXERCISE_ID", 0), ("CATEGORY_ID", 0)],
    );
    connector
        .add_entry_to_table("EXERCISE_CATEGORY", &entry)
        .unwrap();

    connector.rollback_changes(None).unwrap();
    assert!(connector.get_table_content("EXERCISE").unwrap().is_empty());
    assert!(connector
        .get_table_content("EXERCISE_CATEGORY")
        .unwrap()
        .is_empty());
}

#[test]
fn single_table_commit_leaves_other_tables_unflushed() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    add_exercise(&mut connector, "Squat");
    let plan = connector
        .build_entry_for_table(
            "PLAN",
            vec![Value::from(""), Value::from("Plan A"), Value::from("Desc")],
        )
        .unwrap();
    connector.add_entry_to_table("PLAN", &plan).unwrap();

    connector.commit_changes(Some("EXERCISE")).unwrap();
    connector.rollback_changes(None).unwrap();

    assert_eq!(connector.get_table_content("EXERCISE").unwrap().len(), 1);
    assert!(connector.get_table_content("PLAN").unwrap().is_empty());
}

#[test]
fn cascade_delete_removes_relation_rows() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    // exercises 0..=5 so the interesting row has key 5
    for i in 0..=5 {
        add_exercise(&mut connector, &format!("Exercise {}", i));
    }
    let related = relation_entry(
        &connector,
        "EXERCISE_CATEGORY",
        &[("EXERCISE_ID", 5), ("CATEGORY_ID", 2)],
    );
    connector
        .add_entry_to_table("EXERCISE_CATEGORY", &related)
        .unwrap();
    let unrelated = relation_entry(
        &connector,
        "EXERCISE_CATEGORY",
        &[("EXERCISE_ID", 1), ("CATEGORY_ID", 2)],
    );
    connector
        .add_entry_to_table("EXERCISE_CATEGORY", &unrelated)
        .unwrap();
    // second declared relation table is cascaded too
    let in_unit = relation_entry(
        &connector,
        "EXERCISE_UNIT",
        &[("UNIT_ID", 0), ("EXERCISE_ID", 5)],
    );
    connector.add_entry_to_table("EXERCISE_UNIT", &in_unit).unwrap();

    let doomed = connector
        .build_entry_for_table("EXERCISE", exercise_values(Value::Int(5), "Exercise 5"))
        .unwrap();
    assert_eq!(
        connector.delete_entry_from_table("EXERCISE", &doomed).unwrap(),
        5
    );

    assert_eq!(connector.get_table_content("EXERCISE").unwrap().len(), 5);
    let relation_rows = connector.get_table_content("EXERCISE_CATEGORY").unwrap();
    assert_eq!(relation_rows.len(), 1);
    assert_eq!(relation_rows[0].get("EXERCISE_ID"), Some(&Value::Int(1)));
    assert!(connector.get_table_content("EXERCISE_UNIT").unwrap().is_empty());
}

#[test]
fn doomed_delete_leaves_relation_rows_untouched() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    let related = relation_entry(
        &connector,
        "EXERCISE_CATEGORY",
        &[("EXERCISE_ID", 5), ("CATEGORY_ID", 2)],
    );
    connector
        .add_entry_to_table("EXERCISE_CATEGORY", &related)
        .unwrap();

    // exercise 5 does not exist: the delete fails before cascading
    let missing = connector
        .build_entry_for_table("EXERCISE", exercise_values(Value::Int(5), "Ghost"))
        .unwrap();
    let result = connector.delete_entry_from_table("EXERCISE", &missing);
    assert!(matches!(result, Err(EngineError::EntryNotFound { .. })));
    assert_eq!(
        connector.get_table_content("EXERCISE_CATEGORY").unwrap().len(),
        1
    );
}

#[test]
fn shape_mismatch_is_rejected_and_harmless() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);
    add_exercise(&mut connector, "Squat");

    let bad = Record::from_pairs(vec![
        ("ID".to_string(), Value::Int(100)),
        ("NAME".to_string(), Value::from("ERROR")),
    ]);
    for result in [
        connector.add_entry_to_table("EXERCISE", &bad),
        connector.modify_entry_in_table("EXERCISE", &bad),
        connector.delete_entry_from_table("EXERCISE", &bad),
    ] {
        assert!(matches!(result, Err(EngineError::DataMismatch(_))));
    }
    assert_eq!(connector.get_table_content("EXERCISE").unwrap().len(), 1);
}

#[test]
fn committed_data_survives_reopening() {
    let dir = TempDir::new().unwrap();
    let config = setup(&dir);

    {
        let mut connector = DatabaseConnector::open(&config).unwrap();
        let entry = connector
            .build_entry_for_table("EXERCISE", exercise_values(Value::from(""), "Persisted"))
            .unwrap();
        connector.add_entry_to_table("EXERCISE", &entry).unwrap();
        let relation = relation_entry(
            &connector,
            "EXERCISE_CATEGORY",
            &[("EXERCISE_ID", 0), ("CATEGORY_ID", 0)],
        );
        connector
            .add_entry_to_table("EXERCISE_CATEGORY", &relation)
            .unwrap();
        connector.commit_changes(None).unwrap();
    }

    let connector = DatabaseConnector::open(&config).unwrap();
    let content = connector.get_table_content("EXERCISE").unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0].get("NAME"), Some(&Value::from("Persisted")));
    assert_eq!(content[0].get("DURATION"), Some(&Value::from("00:00:00")));
    assert_eq!(
        connector.get_table_content("EXERCISE_CATEGORY").unwrap().len(),
        1
    );
}

#[test]
fn lookup_by_relation_finds_dependent_rows() {
    let dir = TempDir::new().unwrap();
    let mut connector = open(&dir);

    let relation = relation_entry(
        &connector,
        "EXERCISE_CATEGORY",
        &[("EXERCISE_ID", 0), ("CATEGORY_ID", 4)],
    );
    connector
        .add_entry_to_table("EXERCISE_CATEGORY", &relation)
        .unwrap();

    let hits = connector
        .lookup_table_by_relation(&[Value::Int(0)], "EXERCISE", "EXERCISE_CATEGORY")
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get("CATEGORY_ID"), Some(&Value::Int(4)));

    let none = connector
        .lookup_table_by_relation(&[Value::Int(-1)], "EXERCISE", "EXERCISE_CATEGORY")
        .unwrap();
    assert!(none.is_empty());

    let result = connector.lookup_table_by_relation(&[Value::Int(0)], "EXERCISE", "UNIT_PLAN");
    assert!(matches!(result, Err(EngineError::UnknownRelation { .. })));
}

#[test]
fn malformed_schema_aborts_startup() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let schema_path = dir.path().join("db_def.xml");
    fs::write(
        &schema_path,
        r#"
        <DATABASE>
          <TABLE NAME="EXERCISE" TYPE="MAIN">
            <COLUMN TYPE="ID">ID</COLUMN>
            <TRIGGER>ON_DELETE</TRIGGER>
          </TABLE>
        </DATABASE>
        "#,
    )
    .unwrap();
    let config = EngineConfig::new(dir.path().join("test.db"), schema_path);
    assert!(matches!(
        DatabaseConnector::open(&config),
        Err(EngineError::MalformedSchema(_))
    ));
}

#[test]
fn missing_schema_resource_aborts_startup() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(
        dir.path().join("test.db"),
        PathBuf::from(dir.path().join("missing.xml")),
    );
    assert!(matches!(
        DatabaseConnector::open(&config),
        Err(EngineError::SchemaRead(_))
    ));
}
