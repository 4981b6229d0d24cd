use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::StorageConfig,
    executor::{
        create_table::CreateTableExecutor,
        delete::{Deleter, TableDeleter},
        index_scan::IndexScanner,
        insert::{Inserter, TableInserter},
        predicate::{ComparisonOp, Predicate},
        scan::{ScanIterator, Scanner},
        sequential_scan::SequentialScanner,
    },
    storage::{
        bplus_tree::TableTree,
        index_tree::IndexTree,
        schema::{Catalog, ColumnSchema, ROWID_POSITION, TableSchema},
    },
    types::{RowId, error::DatabaseError, row::Row, value::Value},
};

pub const INDEX_FILE_EXTENSION: &str = "ndx";

/// Entry point to the tables and indexes of one data directory
pub struct StorageManager {
    config: StorageConfig,
    catalog: Catalog,
}

impl StorageManager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        Self::with_config(StorageConfig::new(data_dir.as_ref()))
    }

    /// Open the data directory, creating it and its catalog if needed
    pub fn with_config(config: StorageConfig) -> Result<Self, DatabaseError> {
        fs::create_dir_all(&config.data_dir)?;
        let catalog = Catalog::bootstrap(&config.data_dir)?;
        info!(data_dir = %config.data_dir.display(), "opened storage");
        Ok(Self { config, catalog })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        Catalog::table_path(self.data_dir(), table_name)
    }

    pub fn index_path(&self, table_name: &str, column_name: &str) -> PathBuf {
        self.data_dir().join(format!(
            "{}_{}.{}",
            table_name.to_ascii_lowercase(),
            column_name.to_ascii_lowercase(),
            INDEX_FILE_EXTENSION
        ))
    }

    pub fn get_table_schema(&self, table_name: &str) -> Result<TableSchema, DatabaseError> {
        self.catalog.resolve_schema(table_name, false)
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        self.catalog.contains(table_name).unwrap_or(false)
    }

    pub fn table_names(&self) -> Result<Vec<String>, DatabaseError> {
        self.catalog.table_names()
    }

    pub fn has_index(&self, table_name: &str, column_name: &str) -> bool {
        self.index_path(table_name, column_name).exists()
    }

    pub fn open_table(&self, table_name: &str) -> Result<TableTree, DatabaseError> {
        if !self.table_exists(table_name) {
            return Err(DatabaseError::TableNotFound {
                name: table_name.to_string(),
            });
        }
        TableTree::open(self.table_path(table_name))
    }

    pub fn open_index(&self, schema: &TableSchema, column_name: &str) -> Result<IndexTree, DatabaseError> {
        let column = schema
            .get_column(column_name)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: column_name.to_string(),
                table: schema.table_name.clone(),
            })?;
        IndexTree::open(self.index_path(&schema.table_name, &column.name), column.data_type)
    }

    /// Every existing index of a table with the position of its column
    pub fn open_indexes(&self, schema: &TableSchema) -> Result<Vec<(usize, IndexTree)>, DatabaseError> {
        let mut indexes = Vec::new();
        for (position, column) in schema.columns.iter().enumerate() {
            if self.has_index(&schema.table_name, &column.name) {
                indexes.push((position, self.open_index(schema, &column.name)?));
            }
        }
        Ok(indexes)
    }

    /// Create a table file, its catalog rows and an index for every
    /// primary-key or unique column. Ordinals are assigned from 2 on.
    pub fn create_table(
        &mut self,
        table_name: &str,
        columns: Vec<ColumnSchema>,
    ) -> Result<TableSchema, DatabaseError> {
        let table_name = table_name.to_ascii_lowercase();
        if Catalog::is_catalog_table(&table_name) || self.table_exists(&table_name) {
            return Err(DatabaseError::SchemaViolation {
                details: format!("table '{}' already exists", table_name),
            });
        }
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(offset, mut column)| {
                column.position = ROWID_POSITION + 1 + offset;
                column
            })
            .collect();
        let schema = TableSchema::new(table_name, columns);
        CreateTableExecutor::validate_columns(&schema.columns)?;

        TableTree::create(self.table_path(&schema.table_name))?;
        self.catalog.register_table(&schema)?;
        for column in schema.indexed_columns() {
            IndexTree::create(self.index_path(&schema.table_name, &column.name), column.data_type)?;
        }
        info!(
            table = %schema.table_name,
            columns = schema.columns.len(),
            indexes = schema.indexed_columns().len(),
            "created table"
        );
        Ok(schema)
    }

    /// Create an index on one column and fill it from the existing rows
    pub fn create_index(&mut self, table_name: &str, column_name: &str) -> Result<(), DatabaseError> {
        let schema = self.get_table_schema(table_name)?;
        let position = schema
            .get_column_index(column_name)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: column_name.to_string(),
                table: schema.table_name.clone(),
            })?;
        let column = &schema.columns[position];

        let path = self.index_path(&schema.table_name, &column.name);
        let mut index = IndexTree::create(&path, column.data_type)?;
        match self.backfill(&mut index, &schema.table_name, position) {
            Ok(backfilled) => {
                info!(table = %schema.table_name, column = %column.name, backfilled, "created index");
                Ok(())
            }
            Err(err) => {
                drop(index);
                fs::remove_file(&path)?;
                warn!(table = %schema.table_name, column = %column.name, error = %err, "abandoned index");
                Err(err)
            }
        }
    }

    fn backfill(&self, index: &mut IndexTree, table_name: &str, position: usize) -> Result<usize, DatabaseError> {
        let mut backfilled = 0usize;
        for row in self.open_table(table_name)?.scan()? {
            let (Some(row_id), Some(value)) = (row.row_id, row.get_value(position)) else {
                continue;
            };
            if index.insert(value, row_id)? {
                backfilled += 1;
            }
        }
        Ok(backfilled)
    }

    /// Remove a table file, its index files and its catalog rows
    pub fn drop_table(&mut self, table_name: &str) -> Result<(), DatabaseError> {
        if Catalog::is_catalog_table(table_name) {
            return Err(DatabaseError::SchemaViolation {
                details: format!("catalog table '{}' cannot be dropped", table_name),
            });
        }
        let schema = self.get_table_schema(table_name)?;
        for column in &schema.columns {
            let path = self.index_path(&schema.table_name, &column.name);
            if path.exists() {
                fs::remove_file(&path)?;
                debug!(path = %path.display(), "removed index file");
            }
        }
        let path = self.table_path(&schema.table_name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        self.catalog.unregister_table(&schema.table_name)?;
        info!(table = %schema.table_name, "dropped table");
        Ok(())
    }

    /// Insert one row, maintaining every index; returns its rowid
    pub fn insert_row(&mut self, table_name: &str, values: Vec<Value>) -> Result<RowId, DatabaseError> {
        let mut inserter = TableInserter::new(self, table_name)?;
        inserter.insert(values)
    }

    /// Delete rows and their index entries; returns how many existed
    pub fn delete_rows(&mut self, table_name: &str, row_ids: &[RowId]) -> Result<usize, DatabaseError> {
        let mut deleter = TableDeleter::new(self, table_name)?;
        deleter.delete(row_ids)
    }

    /// All rows in rowid order, filtered by `predicate`
    pub fn scan_table(&self, table_name: &str, predicate: Option<Predicate>) -> Result<Vec<Row>, DatabaseError> {
        let scanner = SequentialScanner::new(self, table_name, predicate, None)?;
        ScanIterator::new(scanner).collect()
    }

    /// Like `scan_table`, answered from an index when the predicate's column has one
    pub fn select(&self, table_name: &str, predicate: Option<Predicate>) -> Result<Vec<Row>, DatabaseError> {
        match predicate {
            Some(predicate)
                if predicate.op != ComparisonOp::NotEqual
                    && self.has_index(table_name, &predicate.column_name) =>
            {
                debug!(table = table_name, %predicate, "using index");
                let mut scanner = IndexScanner::new(self, table_name, &predicate)?;
                scanner.scan_all()
            }
            predicate => self.scan_table(table_name, predicate),
        }
    }
}
