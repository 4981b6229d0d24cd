use std::{env, path::PathBuf};

pub const DATA_DIR_ENV: &str = "SLOTDB_DATA_DIR";

const DEFAULT_DATA_DIR: &str = "data";

/// Where a storage manager keeps its files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Data directory from the first CLI argument, then `SLOTDB_DATA_DIR`,
    /// then `./data`
    pub fn from_env() -> Self {
        let data_dir = env::args()
            .nth(1)
            .or_else(|| env::var(DATA_DIR_ENV).ok())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        Self::new(data_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}
