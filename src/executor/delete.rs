use tracing::debug;

use crate::{
    executor::predicate::Predicate,
    storage::{
        bplus_tree::TableTree, index_tree::IndexTree, schema::TableSchema,
        storage_manager::StorageManager,
    },
    types::{RowId, error::DatabaseError},
};

/// Trait for removing rows from database tables
pub trait Deleter {
    /// Delete the listed rows; absent rowids are skipped. Returns how many went.
    fn delete(&mut self, row_ids: &[RowId]) -> Result<usize, DatabaseError>;

    /// Delete every row matching `predicate`, or every row when it is `None`
    fn delete_where(&mut self, predicate: Option<&Predicate>) -> Result<usize, DatabaseError>;

    fn table_name(&self) -> &str;
}

/// Deletes from one table and drops the matching index entries
pub struct TableDeleter {
    schema: TableSchema,
    tree: TableTree,
    indexes: Vec<(usize, IndexTree)>,
}

impl TableDeleter {
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
}

impl Deleter for TableDeleter {
    fn delete(&mut self, row_ids: &[RowId]) -> Result<usize, DatabaseError> {
        let removed = self.tree.delete_many(row_ids)?;
        for row in &removed {
            let Some(row_id) = row.row_id else {
                continue;
            };
            for (position, index) in &mut self.indexes {
                if let Some(value) = row.get_value(*position) {
                    index.remove(value, row_id)?;
                }
            }
        }
        debug!(table = %self.schema.table_name, requested = row_ids.len(), removed = removed.len(), "deleted rows");
        Ok(removed.len())
    }

    fn delete_where(&mut self, predicate: Option<&Predicate>) -> Result<usize, DatabaseError> {
        let predicate = predicate.map(|p| p.bind(&self.schema)).transpose()?;
        let mut row_ids = Vec::new();
        for row in self.tree.scan()? {
            let matched = match &predicate {
                Some(predicate) => predicate.evaluate(&row, &self.schema)?,
                None => true,
            };
            if let (true, Some(row_id)) = (matched, row.row_id) {
                row_ids.push(row_id);
            }
        }
        self.delete(&row_ids)
    }

    fn table_name(&self) -> &str {
        &self.schema.table_name
    }
}
