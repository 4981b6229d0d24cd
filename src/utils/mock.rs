use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{
    config::StorageConfig,
    storage::storage_manager::StorageManager,
    types::error::DatabaseError,
};

/// A data directory that disappears when dropped
pub struct TempDatabase {
    dir: TempDir,
    pub storage_manager: Option<StorageManager>,
}

impl TempDatabase {
    pub fn new() -> Result<Self, DatabaseError> {
        Self::with_prefix("slotdb_test")
    }

    pub fn with_prefix(prefix: &str) -> Result<Self, DatabaseError> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(Self {
            dir,
            storage_manager: None,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the temporary directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn create_storage_manager(&mut self) -> Result<&mut StorageManager, DatabaseError> {
        let storage_manager = StorageManager::with_config(StorageConfig::new(self.dir.path()))?;
        Ok(self.storage_manager.insert(storage_manager))
    }

    pub fn get_storage_manager(&mut self) -> Option<&mut StorageManager> {
        self.storage_manager.as_mut()
    }
}
