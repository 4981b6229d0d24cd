use slotdb::{
    executor::create_table::{CreateTableExecutor, MAX_COLUMNS, TableSchemaBuilder},
    storage::schema::ColumnSchema,
    types::{error::DatabaseError, value::DataType},
    utils::mock::TempDatabase,
};

fn expect_violation(result: Result<impl std::fmt::Debug, DatabaseError>, needle: &str) {
    match result {
        Err(DatabaseError::SchemaViolation { details }) => {
            assert!(details.contains(needle), "'{}' does not mention '{}'", details, needle)
        }
        other => panic!("Expected SchemaViolation about '{}', got {:?}", needle, other),
    }
}

#[test]
fn test_create_simple_table() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("create_simple")?;
    let storage = temp_db.create_storage_manager()?;

    let builder = TableSchemaBuilder::new("users")
        .add_column_with_constraints("id", DataType::Int, false, true, false)
        .add_column_with_constraints("name", DataType::Text, false, false, false)
        .add_column("age", DataType::TinyInt);
    let schema = storage.create_table_with_builder(builder)?;

    assert_eq!(schema.table_name, "users");
    assert_eq!(schema.columns.len(), 3);

    let id = schema.get_column("ID").ok_or(DatabaseError::ColumnNotFound {
        name: "id".to_string(),
        table: "users".to_string(),
    })?;
    assert_eq!(id.data_type, DataType::Int);
    assert_eq!(id.position, 2);
    assert!(id.primary_key && id.unique && !id.nullable);

    assert_eq!(schema.get_column_index("age"), Some(2));
    assert!(schema.columns[2].nullable);
    assert!(storage.table_exists("users"));
    assert!(storage.has_index("users", "id"));
    Ok(())
}

#[test]
fn test_unique_columns_get_an_index() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("create_unique")?;
    let storage = temp_db.create_storage_manager()?;

    let builder = TableSchemaBuilder::new("accounts")
        .add_column("id", DataType::Int)
        .add_column_with_constraints("email", DataType::Text, true, false, true);
    let schema = storage.create_table_with_builder(builder)?;

    let indexed: Vec<&str> = schema.indexed_columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(indexed, vec!["email"]);
    assert!(storage.has_index("accounts", "email"));
    assert!(!storage.has_index("accounts", "id"));
    Ok(())
}

#[test]
fn test_empty_table_is_rejected() {
    expect_violation(TableSchemaBuilder::new("empty").build(), "at least one column");
}

#[test]
fn test_duplicate_column_names_are_rejected() {
    let result = TableSchemaBuilder::new("dupes")
        .add_column("id", DataType::Int)
        .add_column("ID", DataType::Text)
        .build();
    expect_violation(result, "duplicate column");
}

#[test]
fn test_rowid_is_reserved() {
    let result = TableSchemaBuilder::new("reserved")
        .add_column("RowId", DataType::Int)
        .build();
    expect_violation(result, "reserved");
}

#[test]
fn test_single_primary_key_only() {
    let result = TableSchemaBuilder::new("two_keys")
        .add_column_with_constraints("a", DataType::Int, false, true, false)
        .add_column_with_constraints("b", DataType::Int, false, true, false)
        .build();
    expect_violation(result, "primary key");
}

#[test]
fn test_null_type_and_empty_names_are_rejected() {
    let null_type = vec![ColumnSchema::new("a", DataType::Null, 2)];
    expect_violation(CreateTableExecutor::validate_columns(&null_type), "NULL");

    let unnamed = vec![ColumnSchema::new("", DataType::Int, 2)];
    expect_violation(CreateTableExecutor::validate_columns(&unnamed), "empty");
}

#[test]
fn test_column_limit() -> Result<(), DatabaseError> {
    let columns = |count: usize| -> Vec<ColumnSchema> {
        (0..count)
            .map(|i| ColumnSchema::new(format!("c{}", i), DataType::TinyInt, 0))
            .collect()
    };
    CreateTableExecutor::validate_columns(&columns(MAX_COLUMNS))?;
    expect_violation(
        CreateTableExecutor::validate_columns(&columns(MAX_COLUMNS + 1)),
        "exceed",
    );
    Ok(())
}

#[test]
fn test_wide_table_round_trips_through_catalog() -> Result<(), DatabaseError> {
    let mut temp_db = TempDatabase::with_prefix("create_wide")?;
    let storage = temp_db.create_storage_manager()?;

    let mut builder = TableSchemaBuilder::new("wide");
    for i in 0..40 {
        builder = builder.add_column(format!("c{}", i), DataType::SmallInt);
    }
    storage.create_table_with_builder(builder)?;

    let schema = storage.get_table_schema("wide")?;
    assert_eq!(schema.columns.len(), 40);
    assert_eq!(schema.columns[39].name, "c39");
    assert_eq!(schema.columns[39].position, 41);
    Ok(())
}
