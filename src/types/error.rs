use thiserror::Error;

use crate::types::PageId;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page is full (page_id: {page_id})")]
    PageFull { page_id: PageId },

    #[error("Invalid cell index {index} (max: {max})")]
    InvalidCellIndex { index: usize, max: usize },

    #[error("Serialization/deserialization error: {details}")]
    SerializationError { details: String },

    #[error("Table '{name}' not found")]
    TableNotFound { name: String },

    #[error("Column '{name}' not found in table '{table}'")]
    ColumnNotFound { name: String, table: String },

    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    #[error("Schema violation: {details}")]
    SchemaViolation { details: String },

    #[error("Invalid data: {details}")]
    InvalidData { details: String },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Unknown type code: {0}")]
    InvalidTypeCode(u8),

    #[error("Cell of {size} bytes exceeds the limit of {max} bytes")]
    RowTooLarge { size: usize, max: usize },

    #[error("Index entry for key {key} cannot hold more row ids")]
    IndexEntryFull { key: String },

    #[error("Invalid page size: {expected} bytes, got {actual} bytes")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Corrupted page: page_id={page_id}, reason={reason}")]
    CorruptedPage { page_id: PageId, reason: String },

    #[error("Corrupt tree at page {page_id}: {reason}")]
    CorruptTree { page_id: PageId, reason: String },

    #[error("Invalid page type: {0}")]
    InvalidPageType(u8),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
