use std::collections::HashSet;

use crate::{
    storage::{
        schema::{ColumnSchema, ROWID_COLUMN, TableSchema},
        storage_manager::StorageManager,
    },
    types::{error::DatabaseError, value::DataType},
};

/// Most user columns a table can have; the ordinal must fit a TINYINT
pub const MAX_COLUMNS: usize = i8::MAX as usize - 1;

/// Checks column definitions before a table is created
pub struct CreateTableExecutor;

impl CreateTableExecutor {
    /// Validate column definitions
    pub fn validate_columns(columns: &[ColumnSchema]) -> Result<(), DatabaseError> {
        if columns.is_empty() {
            return Err(DatabaseError::SchemaViolation {
                details: "table must have at least one column".to_string(),
            });
        }
        if columns.len() > MAX_COLUMNS {
            return Err(DatabaseError::SchemaViolation {
                details: format!("{} columns exceed the limit of {}", columns.len(), MAX_COLUMNS),
            });
        }

        let mut column_names = HashSet::new();
        for column in columns {
            if column.name.is_empty() {
                return Err(DatabaseError::SchemaViolation {
                    details: "column names cannot be empty".to_string(),
                });
            }
            if column.name.eq_ignore_ascii_case(ROWID_COLUMN) {
                return Err(DatabaseError::SchemaViolation {
                    details: format!("'{}' is reserved", ROWID_COLUMN),
                });
            }
            if column.data_type == DataType::Null {
                return Err(DatabaseError::SchemaViolation {
                    details: format!("column '{}' cannot have type NULL", column.name),
                });
            }
            if !column_names.insert(column.name.to_ascii_lowercase()) {
                return Err(DatabaseError::SchemaViolation {
                    details: format!("duplicate column name: {}", column.name),
                });
            }
        }

        let primary_key_count = columns.iter().filter(|c| c.primary_key).count();
        if primary_key_count > 1 {
            return Err(DatabaseError::SchemaViolation {
                details: "table can have at most one primary key column".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for creating table schemas
pub struct TableSchemaBuilder {
    table_name: String,
    columns: Vec<ColumnSchema>,
}

impl TableSchemaBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.add_column_with_constraints(name, data_type, true, false, false)
    }

    pub fn add_column_with_constraints(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        nullable: bool,
        primary_key: bool,
        unique: bool,
    ) -> Self {
        let mut column = ColumnSchema::new(name, data_type, 0);
        if !nullable {
            column = column.not_null();
        }
        if unique {
            column = column.unique();
        }
        if primary_key {
            column = column.primary_key();
        }
        self.columns.push(column);
        self
    }

    pub fn add_schema_column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    pub fn build(self) -> Result<(String, Vec<ColumnSchema>), DatabaseError> {
        CreateTableExecutor::validate_columns(&self.columns)?;
        Ok((self.table_name, self.columns))
    }
}

/// Extension methods for StorageManager to work with the builder
impl StorageManager {
    /// Create a table using the builder pattern
    pub fn create_table_with_builder(
        &mut self,
        builder: TableSchemaBuilder,
    ) -> Result<TableSchema, DatabaseError> {
        let (table_name, columns) = builder.build()?;
        self.create_table(&table_name, columns)
    }
}
