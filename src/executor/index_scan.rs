use std::collections::VecDeque;

use crate::{
    executor::{predicate::Predicate, scan::Scanner},
    storage::{bplus_tree::TableTree, storage_manager::StorageManager},
    types::{RowId, error::DatabaseError, row::Row},
};

/// Answers a predicate from an index, then fetches the rows by rowid.
///
/// Rows come back in key order; rows with equal keys keep insertion order.
pub struct IndexScanner {
    tree: TableTree,
    row_ids: Vec<RowId>,
    pending: VecDeque<RowId>,
}

impl IndexScanner {
    pub fn new(
        storage_manager: &StorageManager,
        table_name: &str,
        predicate: &Predicate,
    ) -> Result<Self, DatabaseError> {
        let schema = storage_manager.get_table_schema(table_name)?;
        let predicate = predicate.bind(&schema)?;
        let mut index = storage_manager.open_index(&schema, &predicate.column_name)?;
        let row_ids = index.range(predicate.op, &predicate.value)?;
        let tree = storage_manager.open_table(&schema.table_name)?;
        Ok(Self {
            tree,
            pending: row_ids.iter().copied().collect(),
            row_ids,
        })
    }

    /// Rowids the index produced, in scan order
    pub fn row_ids(&self) -> &[RowId] {
        &self.row_ids
    }
}

impl Scanner for IndexScanner {
    fn scan(&mut self) -> Result<Option<Row>, DatabaseError> {
        while let Some(row_id) = self.pending.pop_front() {
            if let Some(row) = self.tree.get(row_id)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn reset(&mut self) -> Result<(), DatabaseError> {
        self.pending = self.row_ids.iter().copied().collect();
        Ok(())
    }
}
