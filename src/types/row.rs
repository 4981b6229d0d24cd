use serde::{Deserialize, Serialize};

use crate::types::{
    RowId,
    error::DatabaseError,
    value::{DataType, Value},
};

/// payload_size(2) + row_id(4) in front of every table-leaf cell
pub const TABLE_LEAF_HEADER_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row_id: Option<RowId>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            row_id: None,
            values,
        }
    }

    pub fn with_row_id(row_id: RowId, values: Vec<Value>) -> Self {
        Self {
            row_id: Some(row_id),
            values,
        }
    }

    pub fn get_value(&self, column_index: usize) -> Option<&Value> {
        self.values.get(column_index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encode as a table-leaf cell:
    /// `payload_size:i16 | row_id:i32 | column_count:u8 | tags | values`
    pub fn to_leaf_cell(&self, schema: &[DataType]) -> Result<Vec<u8>, DatabaseError> {
        let row_id = self.row_id.ok_or_else(|| DatabaseError::InvalidData {
            details: "row has no row id".to_string(),
        })?;
        if self.values.len() != schema.len() {
            return Err(DatabaseError::SchemaViolation {
                details: format!(
                    "row has {} values but the table has {} columns",
                    self.values.len(),
                    schema.len()
                ),
            });
        }
        if schema.len() > u8::MAX as usize {
            return Err(DatabaseError::InvalidData {
                details: format!("{} columns exceed the per-row limit", schema.len()),
            });
        }

        let mut tags = Vec::with_capacity(schema.len());
        let mut body = Vec::new();
        for (value, data_type) in self.values.iter().zip(schema) {
            if !value.is_null() && value.data_type() != *data_type {
                return Err(DatabaseError::TypeMismatch {
                    expected: data_type.to_string(),
                    actual: value.data_type().to_string(),
                });
            }
            tags.push(value.type_code()?);
            value.encode(&mut body)?;
        }

        let payload_size = 1 + tags.len() + body.len();
        let payload = i16::try_from(payload_size).map_err(|_| DatabaseError::RowTooLarge {
            size: payload_size,
            max: i16::MAX as usize,
        })?;

        let mut cell = Vec::with_capacity(TABLE_LEAF_HEADER_SIZE + payload_size);
        cell.extend_from_slice(&payload.to_ne_bytes());
        cell.extend_from_slice(&row_id.to_ne_bytes());
        cell.push(schema.len() as u8);
        cell.extend_from_slice(&tags);
        cell.extend_from_slice(&body);
        Ok(cell)
    }

    pub fn from_leaf_cell(cell: &[u8]) -> Result<Row, DatabaseError> {
        let row_id = Self::leaf_cell_row_id(cell)?;
        let payload_size = i16::from_ne_bytes([cell[0], cell[1]]);
        if payload_size < 1 || TABLE_LEAF_HEADER_SIZE + payload_size as usize != cell.len() {
            return Err(DatabaseError::SerializationError {
                details: format!(
                    "payload size {} does not match cell of {} bytes",
                    payload_size,
                    cell.len()
                ),
            });
        }

        let column_count = cell[TABLE_LEAF_HEADER_SIZE] as usize;
        let tags_start = TABLE_LEAF_HEADER_SIZE + 1;
        let tags = cell
            .get(tags_start..tags_start + column_count)
            .ok_or_else(|| DatabaseError::SerializationError {
                details: "type tags run past the cell".to_string(),
            })?;

        let mut offset = tags_start + column_count;
        let mut values = Vec::with_capacity(column_count);
        for &tag in tags {
            let size = DataType::encoded_size(tag)?;
            let bytes = cell.get(offset..offset + size).ok_or_else(|| {
                DatabaseError::SerializationError {
                    details: format!("value with tag {} runs past the cell", tag),
                }
            })?;
            values.push(Value::decode(tag, bytes)?);
            offset += size;
        }
        if offset != cell.len() {
            return Err(DatabaseError::SerializationError {
                details: format!("{} trailing bytes after row", cell.len() - offset),
            });
        }

        Ok(Row::with_row_id(row_id, values))
    }

    /// Row id of a table-leaf cell without decoding its values
    pub fn leaf_cell_row_id(cell: &[u8]) -> Result<RowId, DatabaseError> {
        if cell.len() < TABLE_LEAF_HEADER_SIZE + 1 {
            return Err(DatabaseError::SerializationError {
                details: format!("table leaf cell of {} bytes is too short", cell.len()),
            });
        }
        Ok(RowId::from_ne_bytes([cell[2], cell[3], cell[4], cell[5]]))
    }
}
