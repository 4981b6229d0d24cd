use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    storage::bplus_tree::TableTree,
    types::{
        RowId,
        error::DatabaseError,
        row::Row,
        value::{DataType, Value},
    },
};

pub const TABLES_TABLE: &str = "tables";
pub const COLUMNS_TABLE: &str = "columns";
pub const ROWID_COLUMN: &str = "rowid";

/// Ordinal of the rowid descriptor; user columns follow it
pub const ROWID_POSITION: usize = 1;

pub const TABLE_FILE_EXTENSION: &str = "tbl";

const YES: &str = "YES";
const NO: &str = "NO";

/// Represents a column definition in a table schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    /// Catalog ordinal: 1 for rowid, user columns from 2
    pub position: usize,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType, position: usize) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            data_type,
            position,
            nullable: true,
            primary_key: false,
            unique: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Primary keys are unique and never NULL
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.unique = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Whether the column gets an index when its table is created
    pub fn is_indexed_by_default(&self) -> bool {
        self.primary_key || self.unique
    }

    fn rowid() -> Self {
        Self {
            name: ROWID_COLUMN.to_string(),
            data_type: DataType::Int,
            position: ROWID_POSITION,
            nullable: false,
            primary_key: false,
            unique: true,
        }
    }

    /// Values of the `columns` catalog row describing this column
    pub fn to_catalog_values(&self, table_name: &str) -> Vec<Value> {
        let flag = |set: bool| Value::Text(if set { YES } else { NO }.to_string());
        vec![
            Value::Text(table_name.to_string()),
            Value::Text(self.name.clone()),
            Value::Text(self.data_type.to_string()),
            Value::TinyInt(self.position as i8),
            flag(self.nullable),
            flag(self.unique),
            flag(self.primary_key),
        ]
    }

    /// Create column schema from a `columns` catalog row
    pub fn from_catalog_row(row: &Row) -> Result<Self, DatabaseError> {
        let corrupt = |what: &str| DatabaseError::SchemaViolation {
            details: format!("catalog row {:?} has an invalid {}", row.row_id, what),
        };
        let text = |index: usize, what: &str| match row.get_value(index) {
            Some(Value::Text(s)) => Ok(s.clone()),
            _ => Err(corrupt(what)),
        };
        let flag = |index: usize, what: &str| text(index, what).map(|s| s == YES);

        let position = match row.get_value(3) {
            Some(Value::TinyInt(p)) if *p > 0 => *p as usize,
            _ => return Err(corrupt("ordinal position")),
        };

        Ok(Self {
            name: text(1, "column name")?,
            data_type: DataType::from_name(&text(2, "data type")?)?,
            position,
            nullable: flag(4, "nullable flag")?,
            unique: flag(5, "unique flag")?,
            primary_key: flag(6, "primary key flag")?,
        })
    }
}

/// Represents a complete table schema with all column definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            table_name: table_name.into().to_ascii_lowercase(),
            columns,
        }
    }

    /// Get column by name, ignoring case
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|col| col.name.eq_ignore_ascii_case(name))
    }

    /// Index of a column within stored row values
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.columns.iter().map(|col| col.data_type).collect()
    }

    /// Columns that carry an index from creation on
    pub fn indexed_columns(&self) -> Vec<&ColumnSchema> {
        self.columns
            .iter()
            .filter(|col| col.is_indexed_by_default())
            .collect()
    }

    /// Check arity, NOT NULL and value types
    pub fn validate_row(&self, values: &[Value]) -> Result<(), DatabaseError> {
        if values.len() != self.columns.len() {
            return Err(DatabaseError::SchemaViolation {
                details: format!(
                    "row has {} values but table '{}' expects {} columns",
                    values.len(),
                    self.table_name,
                    self.columns.len()
                ),
            });
        }

        for (value, column) in values.iter().zip(&self.columns) {
            if value.is_null() {
                if !column.nullable {
                    return Err(DatabaseError::SchemaViolation {
                        details: format!("column '{}' cannot be NULL", column.name),
                    });
                }
                continue;
            }
            if value.data_type() != column.data_type {
                return Err(DatabaseError::TypeMismatch {
                    expected: column.data_type.to_string(),
                    actual: value.data_type().to_string(),
                });
            }
        }

        Ok(())
    }
}

/// The `tables` and `columns` catalog tables of one data directory
#[derive(Debug, Clone)]
pub struct Catalog {
    data_dir: PathBuf,
}

impl Catalog {
    pub fn table_path(data_dir: &Path, table_name: &str) -> PathBuf {
        data_dir.join(format!(
            "{}.{}",
            table_name.to_ascii_lowercase(),
            TABLE_FILE_EXTENSION
        ))
    }

    fn tables_schema() -> TableSchema {
        TableSchema::new(
            TABLES_TABLE,
            vec![ColumnSchema::new("table_name", DataType::Text, 2).not_null()],
        )
    }

    fn columns_schema() -> TableSchema {
        let text = |name: &str, position| ColumnSchema::new(name, DataType::Text, position).not_null();
        TableSchema::new(
            COLUMNS_TABLE,
            vec![
                text("table_name", 2),
                text("column_name", 3),
                text("data_type", 4),
                ColumnSchema::new("ordinal_position", DataType::TinyInt, 5).not_null(),
                text("is_nullable", 6),
                text("unique", 7),
                text("primary_key", 8),
            ],
        )
    }

    /// Open the catalog in `data_dir`, creating either catalog table that
    /// is missing together with its self-describing rows.
    pub fn bootstrap<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        let catalog = Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        };

        let tables_path = Self::table_path(&catalog.data_dir, TABLES_TABLE);
        if !tables_path.exists() {
            let mut tables = TableTree::create(&tables_path)?;
            let types = Self::tables_schema().data_types();
            for name in [TABLES_TABLE, COLUMNS_TABLE] {
                tables.insert(vec![Value::Text(name.to_string())], &types)?;
            }
            info!(path = %tables_path.display(), "bootstrapped tables catalog");
        }

        let columns_path = Self::table_path(&catalog.data_dir, COLUMNS_TABLE);
        if !columns_path.exists() {
            let mut columns = TableTree::create(&columns_path)?;
            let types = Self::columns_schema().data_types();
            for schema in [Self::tables_schema(), Self::columns_schema()] {
                for values in Self::column_rows(&schema) {
                    columns.insert(values, &types)?;
                }
            }
            info!(path = %columns_path.display(), "bootstrapped columns catalog");
        }

        Ok(catalog)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn open(&self, table_name: &str) -> Result<TableTree, DatabaseError> {
        TableTree::open(Self::table_path(&self.data_dir, table_name))
    }

    fn column_rows(schema: &TableSchema) -> Vec<Vec<Value>> {
        std::iter::once(ColumnSchema::rowid())
            .chain(schema.columns.iter().cloned())
            .map(|column| column.to_catalog_values(&schema.table_name))
            .collect()
    }

    /// Ordered column list of `table_name`, optionally with the rowid descriptor
    pub fn resolve_schema(&self, table_name: &str, include_rowid: bool) -> Result<TableSchema, DatabaseError> {
        let table_name = table_name.to_ascii_lowercase();
        let mut columns = Vec::new();
        for row in self.open(COLUMNS_TABLE)?.scan()? {
            if !matches!(row.get_value(0), Some(Value::Text(name)) if *name == table_name) {
                continue;
            }
            let column = ColumnSchema::from_catalog_row(&row)?;
            if include_rowid || column.position != ROWID_POSITION {
                columns.push(column);
            }
        }
        if columns.is_empty() {
            return Err(DatabaseError::TableNotFound { name: table_name });
        }
        columns.sort_by_key(|column| column.position);
        Ok(TableSchema::new(table_name, columns))
    }

    pub fn table_names(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self
            .open(TABLES_TABLE)?
            .scan()?
            .into_iter()
            .filter_map(|row| match row.values.into_iter().next() {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    pub fn contains(&self, table_name: &str) -> Result<bool, DatabaseError> {
        let table_name = table_name.to_ascii_lowercase();
        Ok(self.table_names()?.contains(&table_name))
    }

    /// Record a new table and its columns
    pub fn register_table(&self, schema: &TableSchema) -> Result<(), DatabaseError> {
        if self.contains(&schema.table_name)? {
            return Err(DatabaseError::SchemaViolation {
                details: format!("table '{}' already exists", schema.table_name),
            });
        }
        self.open(TABLES_TABLE)?.insert(
            vec![Value::Text(schema.table_name.clone())],
            &Self::tables_schema().data_types(),
        )?;

        let mut columns = self.open(COLUMNS_TABLE)?;
        let types = Self::columns_schema().data_types();
        for values in Self::column_rows(schema) {
            columns.insert(values, &types)?;
        }
        debug!(table = %schema.table_name, columns = schema.columns.len(), "registered table");
        Ok(())
    }

    /// Delete every catalog row that mentions `table_name`
    pub fn unregister_table(&self, table_name: &str) -> Result<(), DatabaseError> {
        let table_name = table_name.to_ascii_lowercase();
        for catalog_table in [TABLES_TABLE, COLUMNS_TABLE] {
            let mut tree = self.open(catalog_table)?;
            let row_ids: Vec<RowId> = tree
                .scan()?
                .into_iter()
                .filter(|row| matches!(row.get_value(0), Some(Value::Text(name)) if *name == table_name))
                .filter_map(|row| row.row_id)
                .collect();
            tree.delete_many(&row_ids)?;
        }
        debug!(table = %table_name, "unregistered table");
        Ok(())
    }

    pub fn is_catalog_table(table_name: &str) -> bool {
        table_name.eq_ignore_ascii_case(TABLES_TABLE) || table_name.eq_ignore_ascii_case(COLUMNS_TABLE)
    }
}
