use slotdb::{
    executor::{
        create_table::TableSchemaBuilder,
        delete::{Deleter, TableDeleter},
        insert::{Inserter, TableInserter},
        predicate::Predicate,
    },
    storage::storage_manager::StorageManager,
    types::{
        error::DatabaseError,
        value::{DataType, Value},
    },
    utils::mock::TempDatabase,
};

fn create_people(storage: &mut StorageManager) -> Result<(), DatabaseError> {
    let builder = TableSchemaBuilder::new("people")
        .add_column_with_constraints("id", DataType::Int, false, true, false)
        .add_column_with_constraints("name", DataType::Text, false, false, false)
        .add_column_with_constraints("email", DataType::Text, true, false, true)
        .add_column("age", DataType::TinyInt);
    storage.create_table_with_builder(builder)?;
    Ok(())
}

fn person(id: i32, name: &str, email: Option<&str>, age: Option<i32>) -> Vec<Value> {
    vec![
        Value::Int(id),
        Value::Text(name.to_string()),
        email.map_or(Value::Null, |e| Value::Text(e.to_string())),
        age.map_or(Value::Null, Value::Int),
    ]
}

#[test]
fn test_table_inserter_creation() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("inserter_creation")?;
    let storage = temp_db.create_storage_manager()?;
    create_people(storage)?;

    let inserter = TableInserter::new(storage, "PEOPLE")?;
    assert_eq!(inserter.table_name(), "people");
    assert_eq!(inserter.schema().columns.len(), 4);
    Ok(())
}

#[test]
fn test_table_inserter_nonexistent_table() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("inserter_nonexistent")?;
    let storage = temp_db.create_storage_manager()?;

    match TableInserter::new(storage, "nonexistent_table") {
        Err(DatabaseError::TableNotFound { name }) => assert_eq!(name, "nonexistent_table"),
        Err(other) => panic!("Expected TableNotFound, got {:?}", other),
        Ok(_) => panic!("Expected TableNotFound"),
    }
    Ok(())
}

#[test]
fn test_insert_assigns_row_ids_and_casts_literals() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("inserter_single")?;
    let storage = temp_db.create_storage_manager()?;
    create_people(storage)?;

    let mut inserter = TableInserter::new(storage, "people")?;
    let first = inserter.insert(person(10, "ann", Some("ann@x.io"), Some(31)))?;
    let second = inserter.insert(person(11, "bob", None, None))?;
    assert_eq!((first, second), (1, 2));

    let rows = storage.scan_table("people", None)?;
    assert_eq!(rows.len(), 2);
    // INT literal stored as the column's TINYINT
    assert_eq!(rows[0].values[3], Value::TinyInt(31));
    assert_eq!(rows[1].values[2], Value::Null);
    assert_eq!(rows[1].row_id, Some(2));
    Ok(())
}

#[test]
fn test_insert_batch() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("inserter_batch")?;
    let storage = temp_db.create_storage_manager()?;
    create_people(storage)?;

    let mut inserter = TableInserter::new(storage, "people")?;
    let rows: Vec<Vec<Value>> = (1..=100)
        .map(|id| person(id, &format!("person{}", id), None, Some(id % 90)))
        .collect();
    let row_ids = inserter.insert_batch(rows)?;
    assert_eq!(row_ids, (1..=100).collect::<Vec<_>>());

    let mut table = storage.open_table("people")?;
    let stats = table.validate()?;
    assert_eq!(stats.leaf_cell_count, 100);
    assert!(stats.depth >= 2);
    Ok(())
}

#[test]
fn test_not_null_violation() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("inserter_not_null")?;
    let storage = temp_db.create_storage_manager()?;
    create_people(storage)?;

    let mut inserter = TableInserter::new(storage, "people")?;
    let values = vec![Value::Int(1), Value::Null, Value::Null, Value::Null];
    match inserter.insert(values) {
        Err(DatabaseError::SchemaViolation { details }) => assert!(details.contains("name")),
        other => panic!("Expected SchemaViolation, got {:?}", other),
    }
    assert!(storage.scan_table("people", None)?.is_empty());
    Ok(())
}

#[test]
fn test_unique_violation_leaves_table_untouched() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("inserter_unique")?;
    let storage = temp_db.create_storage_manager()?;
    create_people(storage)?;

    let mut inserter = TableInserter::new(storage, "people")?;
    inserter.insert(person(1, "ann", Some("a@x.io"), None))?;

    // Primary key
    assert!(matches!(
        inserter.insert(person(1, "other", None, None)),
        Err(DatabaseError::SchemaViolation { .. })
    ));
    // Unique column
    assert!(matches!(
        inserter.insert(person(2, "other", Some("a@x.io"), None)),
        Err(DatabaseError::SchemaViolation { .. })
    ));
    // NULLs never collide
    inserter.insert(person(3, "cy", None, None))?;
    inserter.insert(person(4, "di", None, None))?;

    assert_eq!(storage.scan_table("people", None)?.len(), 3);
    let schema = storage.get_table_schema("people")?;
    let mut email_index = storage.open_index(&schema, "email")?;
    assert_eq!(email_index.entries()?.len(), 1);
    Ok(())
}

#[test]
fn test_type_and_arity_errors() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("inserter_types")?;
    let storage = temp_db.create_storage_manager()?;
    create_people(storage)?;

    let mut inserter = TableInserter::new(storage, "people")?;
    assert!(matches!(
        inserter.insert(vec![Value::Int(1)]),
        Err(DatabaseError::SchemaViolation { .. })
    ));
    // 300 does not fit a TINYINT
    assert!(matches!(
        inserter.insert(person(1, "ann", None, Some(300))),
        Err(DatabaseError::TypeMismatch { .. })
    ));
    assert!(
        inserter
            .insert(vec![Value::Text("x".to_string()), Value::Text("ann".to_string()), Value::Null, Value::Null])
            .is_err()
    );
    Ok(())
}

#[test]
fn test_deleted_key_can_be_reused() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("inserter_reuse")?;
    let storage = temp_db.create_storage_manager()?;
    create_people(storage)?;

    storage.insert_row("people", person(1, "ann", Some("a@x.io"), None))?;
    storage.insert_row("people", person(2, "bob", Some("b@x.io"), None))?;

    let mut deleter = TableDeleter::new(storage, "people")?;
    assert_eq!(deleter.table_name(), "people");
    assert_eq!(deleter.delete_where(Some(&Predicate::eq("id", Value::Int(1))))?, 1);

    storage.insert_row("people", person(1, "ann again", Some("a@x.io"), None))?;
    let rows = storage.select("people", Some(Predicate::eq("email", Value::Text("a@x.io".to_string()))))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values[1], Value::Text("ann again".to_string()));
    Ok(())
}

#[test]
fn test_delete_without_predicate_empties_table() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("deleter_all")?;
    let storage = temp_db.create_storage_manager()?;
    create_people(storage)?;
    for id in 1..=60 {
        storage.insert_row("people", person(id, &format!("p{}", id), Some(&format!("p{}@x.io", id)), None))?;
    }

    let mut deleter = TableDeleter::new(storage, "people")?;
    assert_eq!(deleter.delete(&[5, 5, 999])?, 1);
    assert_eq!(deleter.delete_where(None)?, 59);

    assert!(storage.scan_table("people", None)?.is_empty());
    let schema = storage.get_table_schema("people")?;
    for column in ["id", "email"] {
        let mut index = storage.open_index(&schema, column)?;
        assert!(index.entries()?.is_empty(), "index on {} not emptied", column);
        index.validate()?;
    }
    Ok(())
}
