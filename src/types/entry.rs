use crate::types::{
    PageId, RowId,
    error::DatabaseError,
    page::read_left_child,
    value::{DataType, Value},
};

/// An index key with every row id that carries it, in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: Value,
    pub row_ids: Vec<RowId>,
}

impl IndexEntry {
    pub fn new(key: Value, row_id: RowId) -> Self {
        Self {
            key,
            row_ids: vec![row_id],
        }
    }

    pub fn contains(&self, row_id: RowId) -> bool {
        self.row_ids.contains(&row_id)
    }

    /// Append `row_id` unless already present; returns whether it was added
    pub fn add_row_id(&mut self, row_id: RowId) -> Result<bool, DatabaseError> {
        if self.contains(row_id) {
            return Ok(false);
        }
        if self.row_ids.len() >= u8::MAX as usize {
            return Err(DatabaseError::IndexEntryFull {
                key: self.key.to_string(),
            });
        }
        self.row_ids.push(row_id);
        Ok(true)
    }

    pub fn remove_row_id(&mut self, row_id: RowId) -> bool {
        let before = self.row_ids.len();
        self.row_ids.retain(|&id| id != row_id);
        self.row_ids.len() != before
    }

    /// `assoc_count:u8 | key_tag:u8 | key | row_ids`
    fn encode_body(&self) -> Result<Vec<u8>, DatabaseError> {
        if self.row_ids.len() > u8::MAX as usize {
            return Err(DatabaseError::IndexEntryFull {
                key: self.key.to_string(),
            });
        }
        let mut body = Vec::with_capacity(2 + self.key.size() + 4 * self.row_ids.len());
        body.push(self.row_ids.len() as u8);
        body.push(self.key.type_code()?);
        self.key.encode(&mut body)?;
        for row_id in &self.row_ids {
            body.extend_from_slice(&row_id.to_ne_bytes());
        }
        Ok(body)
    }

    fn decode_body(body: &[u8]) -> Result<Self, DatabaseError> {
        if body.len() < 2 {
            return Err(DatabaseError::SerializationError {
                details: "index entry body is too short".to_string(),
            });
        }
        let assoc_count = body[0] as usize;
        let key_tag = body[1];
        let key_size = DataType::encoded_size(key_tag)?;
        let key_end = 2 + key_size;
        if body.len() != key_end + 4 * assoc_count {
            return Err(DatabaseError::SerializationError {
                details: format!(
                    "index entry of {} bytes does not hold {} row ids",
                    body.len(),
                    assoc_count
                ),
            });
        }
        let key = Value::decode(key_tag, &body[2..key_end])?;
        let row_ids = body[key_end..]
            .chunks_exact(4)
            .map(|chunk| RowId::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self { key, row_ids })
    }

    /// `payload_size:i16 | body`
    pub fn to_leaf_cell(&self) -> Result<Vec<u8>, DatabaseError> {
        let body = self.encode_body()?;
        let mut cell = Vec::with_capacity(2 + body.len());
        cell.extend_from_slice(&(body.len() as i16).to_ne_bytes());
        cell.extend_from_slice(&body);
        Ok(cell)
    }

    /// `left_child:i32 | payload_size:i16 | body`
    pub fn to_interior_cell(&self, left_child: PageId) -> Result<Vec<u8>, DatabaseError> {
        let leaf = self.to_leaf_cell()?;
        Ok(leaf_to_interior(&leaf, left_child))
    }

    pub fn from_leaf_cell(cell: &[u8]) -> Result<Self, DatabaseError> {
        if cell.len() < 2 {
            return Err(DatabaseError::SerializationError {
                details: "index leaf cell is too short".to_string(),
            });
        }
        let payload_size = i16::from_ne_bytes([cell[0], cell[1]]);
        if payload_size < 0 || payload_size as usize != cell.len() - 2 {
            return Err(DatabaseError::SerializationError {
                details: format!(
                    "payload size {} does not match cell of {} bytes",
                    payload_size,
                    cell.len()
                ),
            });
        }
        Self::decode_body(&cell[2..])
    }

    pub fn from_interior_cell(cell: &[u8]) -> Result<(PageId, Self), DatabaseError> {
        let left_child = read_left_child(cell).ok_or_else(|| DatabaseError::SerializationError {
            details: "index interior cell has no left child".to_string(),
        })?;
        Ok((left_child, Self::from_leaf_cell(&cell[4..])?))
    }
}

pub fn leaf_to_interior(leaf_cell: &[u8], left_child: PageId) -> Vec<u8> {
    let mut cell = Vec::with_capacity(4 + leaf_cell.len());
    cell.extend_from_slice(&(left_child as i32).to_ne_bytes());
    cell.extend_from_slice(leaf_cell);
    cell
}

pub fn interior_to_leaf(interior_cell: &[u8]) -> Vec<u8> {
    interior_cell.get(4..).unwrap_or_default().to_vec()
}
