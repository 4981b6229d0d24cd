use tracing::{debug, warn};

use crate::{
    storage::{
        bplus_tree::TableTree, index_tree::IndexTree, schema::TableSchema,
        storage_manager::StorageManager,
    },
    types::{RowId, error::DatabaseError, value::Value},
};

/// Trait for inserting data into database tables
pub trait Inserter {
    /// Insert a single row into the table, returning its rowid
    fn insert(&mut self, values: Vec<Value>) -> Result<RowId, DatabaseError>;

    /// Insert multiple rows, stopping at the first failure
    fn insert_batch(&mut self, rows: Vec<Vec<Value>>) -> Result<Vec<RowId>, DatabaseError>;

    /// Get the table name this inserter operates on
    fn table_name(&self) -> &str;
}

/// Inserts into one table and keeps its indexes in step
pub struct TableInserter {
    schema: TableSchema,
    tree: TableTree,
    indexes: Vec<(usize, IndexTree)>,
}

impl TableInserter {
    pub fn new(storage_manager: &StorageManager, table_name: &str) -> Result<Self, DatabaseError> {
        let schema = storage_manager.get_table_schema(table_name)?;
        let tree = storage_manager.open_table(&schema.table_name)?;
        let indexes = storage_manager.open_indexes(&schema)?;
        Ok(Self {
            schema,
            tree,
            indexes,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Cast literals to the column types, then check constraints
    fn prepare(&mut self, values: Vec<Value>) -> Result<Vec<Value>, DatabaseError> {
        if values.len() != self.schema.columns.len() {
            return Err(DatabaseError::SchemaViolation {
                details: format!(
                    "table '{}' has {} columns but {} values were supplied",
                    self.schema.table_name,
                    self.schema.columns.len(),
                    values.len()
                ),
            });
        }
        let values = values
            .into_iter()
            .zip(&self.schema.columns)
            .map(|(value, column)| value.cast(column.data_type))
            .collect::<Result<Vec<_>, _>>()?;
        self.schema.validate_row(&values)?;

        let row_id = self.tree.next_row_id()?;
        for (position, index) in &mut self.indexes {
            let column = &self.schema.columns[*position];
            let value = &values[*position];
            if column.unique && !value.is_null() && !index.lookup(value)?.is_empty() {
                return Err(DatabaseError::SchemaViolation {
                    details: format!("duplicate value {} for unique column '{}'", value, column.name),
                });
            }
            index.check_insert(value, row_id)?;
        }
        Ok(values)
    }

    fn index_row(&mut self, values: &[Value], row_id: RowId) -> Result<(), DatabaseError> {
        for (position, index) in &mut self.indexes {
            index.insert(&values[*position], row_id)?;
        }
        Ok(())
    }

    /// Take back a row whose index entries could not all be written
    fn roll_back(&mut self, values: &[Value], row_id: RowId) -> Result<(), DatabaseError> {
        for (position, index) in &mut self.indexes {
            index.remove(&values[*position], row_id)?;
        }
        self.tree.delete(row_id)?;
        Ok(())
    }
}

impl Inserter for TableInserter {
    fn insert(&mut self, values: Vec<Value>) -> Result<RowId, DatabaseError> {
        let values = self.prepare(values)?;
        let row_id = self.tree.insert(values.clone(), &self.schema.data_types())?;
        if let Err(err) = self.index_row(&values, row_id) {
            warn!(table = %self.schema.table_name, row_id, error = %err, "rolling back row");
            self.roll_back(&values, row_id)?;
            return Err(err);
        }
        debug!(table = %self.schema.table_name, row_id, "inserted row");
        Ok(row_id)
    }

    fn insert_batch(&mut self, rows: Vec<Vec<Value>>) -> Result<Vec<RowId>, DatabaseError> {
        rows.into_iter().map(|values| self.insert(values)).collect()
    }

    fn table_name(&self) -> &str {
        &self.schema.table_name
    }
}
