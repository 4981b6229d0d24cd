use std::collections::VecDeque;

use crate::{
    executor::{predicate::Predicate, scan::Scanner},
    storage::{bplus_tree::TableTree, schema::TableSchema, storage_manager::StorageManager},
    types::{PageId, error::DatabaseError, row::Row},
};

/// Walks a table's leaf chain from the leftmost leaf, reading whole leaves
/// ahead until `batch_size` rows are buffered
pub struct SequentialScanner {
    tree: TableTree,
    schema: TableSchema,
    predicate: Option<Predicate>,
    next_page_id: Option<PageId>,
    current_rows: VecDeque<Row>,
    batch_size: usize,
    is_started: bool,
    is_exhausted: bool,
}

impl SequentialScanner {
    pub fn new(
        storage_manager: &StorageManager,
        table_name: &str,
        predicate: Option<Predicate>,
        batch_size: Option<usize>,
    ) -> Result<Self, DatabaseError> {
        let schema = storage_manager.get_table_schema(table_name)?;
        let tree = storage_manager.open_table(&schema.table_name)?;
        let predicate = predicate.map(|p| p.bind(&schema)).transpose()?;
        Ok(Self {
            tree,
            schema,
            predicate,
            next_page_id: None,
            current_rows: VecDeque::new(),
            batch_size: batch_size.unwrap_or(32).max(1),
            is_started: false,
            is_exhausted: false,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Rows read ahead and not yet returned
    pub fn buffered(&self) -> usize {
        self.current_rows.len()
    }

    /// Read leaves ahead until `batch_size` rows are buffered; false once
    /// the chain is exhausted
    fn fill_buffer(&mut self) -> Result<bool, DatabaseError> {
        if !self.is_started {
            self.is_started = true;
            self.next_page_id = Some(self.tree.leftmost_leaf()?);
        }
        let mut loaded = false;
        while self.current_rows.len() < self.batch_size {
            let Some(page_id) = self.next_page_id else {
                break;
            };
            let (rows, next) = self.tree.read_leaf(page_id)?;
            self.current_rows.extend(rows);
            self.next_page_id = next;
            loaded = true;
        }
        Ok(loaded)
    }

    fn accepts(&self, row: &Row) -> Result<bool, DatabaseError> {
        match &self.predicate {
            Some(predicate) => predicate.evaluate(row, &self.schema),
            None => Ok(true),
        }
    }
}

impl Scanner for SequentialScanner {
    fn scan(&mut self) -> Result<Option<Row>, DatabaseError> {
        if self.is_exhausted {
            return Ok(None);
        }
        loop {
            while let Some(row) = self.current_rows.pop_front() {
                if self.accepts(&row)? {
                    return Ok(Some(row));
                }
            }
            if !self.fill_buffer()? {
                self.is_exhausted = true;
                return Ok(None);
            }
        }
    }

    fn reset(&mut self) -> Result<(), DatabaseError> {
        self.next_page_id = None;
        self.current_rows.clear();
        self.is_started = false;
        self.is_exhausted = false;
        Ok(())
    }
}
