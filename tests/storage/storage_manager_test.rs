use slotdb::{
    executor::predicate::Predicate,
    storage::{
        schema::{COLUMNS_TABLE, ColumnSchema, ROWID_COLUMN, TABLES_TABLE},
        storage_manager::StorageManager,
    },
    types::{
        RowId,
        error::DatabaseError,
        row::Row,
        value::{DataType, Value},
    },
    utils::mock::TempDatabase,
};

fn employee_columns() -> Vec<ColumnSchema> {
    vec![
        ColumnSchema::new("id", DataType::Int, 0).primary_key(),
        ColumnSchema::new("name", DataType::Text, 0).not_null(),
        ColumnSchema::new("dept", DataType::SmallInt, 0),
    ]
}

fn employee(id: i32, name: &str, dept: Option<i16>) -> Vec<Value> {
    vec![
        Value::Int(id),
        Value::Text(name.to_string()),
        dept.map_or(Value::Null, Value::SmallInt),
    ]
}

fn ids_of(rows: &[Row]) -> Vec<i32> {
    rows.iter()
        .filter_map(|row| match row.get_value(0) {
            Some(Value::Int(id)) => Some(*id),
            _ => None,
        })
        .collect()
}

#[test]
fn test_bootstrap_creates_self_describing_catalog() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("storage_bootstrap")?;
    let storage = StorageManager::new(temp_db.path())?;

    assert!(temp_db.file("tables.tbl").exists());
    assert!(temp_db.file("columns.tbl").exists());
    assert_eq!(storage.table_names()?, vec![TABLES_TABLE.to_string(), COLUMNS_TABLE.to_string()]);

    let tables = storage.get_table_schema(TABLES_TABLE)?;
    assert_eq!(tables.column_names(), vec!["table_name".to_string()]);

    let columns = storage.catalog().resolve_schema(COLUMNS_TABLE, true)?;
    assert_eq!(columns.columns[0].name, ROWID_COLUMN);
    assert_eq!(columns.columns[0].position, 1);
    assert_eq!(columns.columns.len(), 8);
    assert_eq!(columns.columns[4].name, "ordinal_position");
    assert_eq!(columns.columns[4].data_type, DataType::TinyInt);
    Ok(())
}

#[test]
fn test_bootstrap_is_idempotent() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("storage_rebootstrap")?;
    {
        let mut storage = StorageManager::new(temp_db.path())?;
        storage.create_table("employees", employee_columns())?;
    }
    let storage = StorageManager::new(temp_db.path())?;
    assert_eq!(storage.table_names()?.len(), 3);
    assert_eq!(storage.scan_table(COLUMNS_TABLE, None)?.len(), 2 + 8 + 4);
    Ok(())
}

#[test]
fn test_create_table_registers_columns_and_indexes() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_create")?;
    let storage = temp_db.create_storage_manager()?;

    let schema = storage.create_table("Employees", employee_columns())?;
    assert_eq!(schema.table_name, "employees");
    let positions: Vec<usize> = schema.columns.iter().map(|c| c.position).collect();
    assert_eq!(positions, vec![2, 3, 4]);

    assert!(storage.table_exists("employees"));
    assert!(storage.table_path("employees").exists());
    assert!(storage.has_index("employees", "id"));
    assert!(!storage.has_index("employees", "name"));

    let resolved = storage.get_table_schema("EMPLOYEES")?;
    assert_eq!(resolved, schema);
    assert!(resolved.columns[0].primary_key);
    assert!(!resolved.columns[1].nullable);
    Ok(())
}

#[test]
fn test_duplicate_and_catalog_tables_are_rejected() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_duplicate")?;
    let storage = temp_db.create_storage_manager()?;
    storage.create_table("employees", employee_columns())?;

    assert!(matches!(
        storage.create_table("employees", employee_columns()),
        Err(DatabaseError::SchemaViolation { .. })
    ));
    assert!(matches!(
        storage.create_table(TABLES_TABLE, employee_columns()),
        Err(DatabaseError::SchemaViolation { .. })
    ));
    assert!(matches!(
        storage.drop_table(COLUMNS_TABLE),
        Err(DatabaseError::SchemaViolation { .. })
    ));
    Ok(())
}

#[test]
fn test_drop_table_removes_files_and_catalog_rows() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_drop")?;
    let storage = temp_db.create_storage_manager()?;
    storage.create_table("employees", employee_columns())?;
    storage.insert_row("employees", employee(1, "ann", Some(3)))?;
    let catalog_rows = storage.scan_table(COLUMNS_TABLE, None)?.len();

    storage.drop_table("employees")?;

    assert!(!storage.table_exists("employees"));
    assert!(!storage.table_path("employees").exists());
    assert!(!storage.index_path("employees", "id").exists());
    assert_eq!(storage.scan_table(COLUMNS_TABLE, None)?.len(), catalog_rows - 4);
    match storage.get_table_schema("employees") {
        Err(DatabaseError::TableNotFound { name }) => assert_eq!(name, "employees"),
        other => panic!("Expected TableNotFound, got {:?}", other),
    }

    // The name is free again
    storage.create_table("employees", employee_columns())?;
    assert!(storage.scan_table("employees", None)?.is_empty());
    Ok(())
}

#[test]
fn test_missing_table_is_reported() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_missing")?;
    let storage = temp_db.create_storage_manager()?;

    match storage.insert_row("ghosts", vec![Value::Int(1)]) {
        Err(DatabaseError::TableNotFound { name }) => assert_eq!(name, "ghosts"),
        other => panic!("Expected TableNotFound, got {:?}", other),
    }
    assert!(storage.drop_table("ghosts").is_err());
    Ok(())
}

#[test]
fn test_index_lookups_agree_with_scans() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_index_agree")?;
    let storage = temp_db.create_storage_manager()?;
    storage.create_table("employees", employee_columns())?;
    storage.create_index("employees", "dept")?;

    for id in 1..=120 {
        let dept = if id % 10 == 0 { None } else { Some((id % 7) as i16) };
        storage.insert_row("employees", employee(id, &format!("emp{}", id), dept))?;
    }
    let doomed: Vec<RowId> = (1..=120).filter(|id| id % 3 == 0).collect();
    assert_eq!(storage.delete_rows("employees", &doomed)?, 40);

    let predicates = [
        Predicate::eq("dept", Value::Int(4)),
        Predicate::lt("dept", Value::Int(2)),
        Predicate::ge("id", Value::Int(100)),
        Predicate::eq("id", Value::Int(30)),
        Predicate::eq("id", Value::Int(31)),
    ];
    for predicate in predicates {
        let mut indexed = ids_of(&storage.select("employees", Some(predicate.clone()))?);
        let scanned = ids_of(&storage.scan_table("employees", Some(predicate.clone()))?);
        indexed.sort_unstable();
        assert_eq!(indexed, scanned, "predicate {}", predicate);
    }
    Ok(())
}

#[test]
fn test_create_index_backfills_existing_rows() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_backfill")?;
    let storage = temp_db.create_storage_manager()?;
    storage.create_table("employees", employee_columns())?;
    for id in 1..=10 {
        storage.insert_row("employees", employee(id, "same", Some(1)))?;
    }

    storage.create_index("employees", "name")?;
    let schema = storage.get_table_schema("employees")?;
    let mut index = storage.open_index(&schema, "name")?;
    assert_eq!(index.lookup(&Value::Text("same".to_string()))?, (1..=10).collect::<Vec<_>>());

    assert!(matches!(
        storage.create_index("employees", "salary"),
        Err(DatabaseError::ColumnNotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_scan_table_filters_with_predicate() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_scan")?;
    let storage = temp_db.create_storage_manager()?;
    storage.create_table("employees", employee_columns())?;
    storage.insert_row("employees", employee(1, "ann", Some(1)))?;
    storage.insert_row("employees", employee(2, "bob", None))?;
    storage.insert_row("employees", employee(3, "cy", Some(2)))?;

    let rows = storage.scan_table("employees", Some(Predicate::ne("dept", Value::Int(1))))?;
    // NULL never satisfies a comparison
    assert_eq!(ids_of(&rows), vec![3]);
    assert_eq!(rows[0].row_id, Some(3));
    Ok(())
}

#[test]
fn test_full_index_entry_rejects_the_whole_row() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_full_entry")?;
    let storage = temp_db.create_storage_manager()?;
    storage.create_table("employees", employee_columns())?;
    storage.create_index("employees", "dept")?;

    // A SMALLINT entry holds at most 59 row ids
    for id in 1..=59 {
        storage.insert_row("employees", employee(id, "e", Some(1)))?;
    }
    match storage.insert_row("employees", employee(60, "e", Some(1))) {
        Err(DatabaseError::IndexEntryFull { key }) => assert_eq!(key, "1"),
        other => panic!("Expected IndexEntryFull, got {:?}", other),
    }

    assert_eq!(storage.scan_table("employees", None)?.len(), 59);
    let by_dept = storage.select("employees", Some(Predicate::eq("dept", Value::SmallInt(1))))?;
    assert_eq!(by_dept.len(), 59);
    assert!(storage.select("employees", Some(Predicate::eq("id", Value::Int(60))))?.is_empty());

    assert_eq!(storage.insert_row("employees", employee(60, "e", Some(2)))?, 60);
    storage.open_table("employees")?.validate()?;
    Ok(())
}

#[test]
fn test_failed_backfill_leaves_no_index_file() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("storage_failed_backfill")?;
    let storage = temp_db.create_storage_manager()?;
    storage.create_table("employees", employee_columns())?;
    for id in 1..=60 {
        storage.insert_row("employees", employee(id, "e", Some(7)))?;
    }

    assert!(matches!(
        storage.create_index("employees", "dept"),
        Err(DatabaseError::IndexEntryFull { .. })
    ));
    assert!(!storage.has_index("employees", "dept"));
    assert!(!storage.index_path("employees", "dept").exists());

    storage.insert_row("employees", employee(61, "e", Some(7)))?;
    let by_dept = storage.select("employees", Some(Predicate::eq("dept", Value::SmallInt(7))))?;
    assert_eq!(by_dept.len(), 61);
    Ok(())
}
