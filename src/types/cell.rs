use crate::types::{
    PageId, RowId,
    entry::IndexEntry,
    error::DatabaseError,
    page::{PageType, read_left_child},
    row::Row,
};

/// Separator in a table-interior page: `left_child:i32 | row_id:i32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableInteriorCell {
    pub left_child: PageId,
    pub row_id: RowId,
}

pub const TABLE_INTERIOR_CELL_SIZE: usize = 8;

impl TableInteriorCell {
    pub fn new(left_child: PageId, row_id: RowId) -> Self {
        Self { left_child, row_id }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut cell = Vec::with_capacity(TABLE_INTERIOR_CELL_SIZE);
        cell.extend_from_slice(&(self.left_child as i32).to_ne_bytes());
        cell.extend_from_slice(&self.row_id.to_ne_bytes());
        cell
    }

    pub fn decode(cell: &[u8]) -> Result<Self, DatabaseError> {
        if cell.len() != TABLE_INTERIOR_CELL_SIZE {
            return Err(DatabaseError::SerializationError {
                details: format!("table interior cell has {} bytes", cell.len()),
            });
        }
        let left_child = read_left_child(cell).ok_or_else(|| DatabaseError::SerializationError {
            details: "table interior cell has no left child".to_string(),
        })?;
        let row_id = RowId::from_ne_bytes([cell[4], cell[5], cell[6], cell[7]]);
        Ok(Self { left_child, row_id })
    }
}

/// Any cell, decoded according to the kind of page it lives in
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    TableLeaf(Row),
    TableInterior(TableInteriorCell),
    IndexLeaf(IndexEntry),
    IndexInterior { left_child: PageId, entry: IndexEntry },
}

impl Cell {
    pub fn decode(page_type: PageType, bytes: &[u8]) -> Result<Cell, DatabaseError> {
        match page_type {
            PageType::LeafTable => Ok(Cell::TableLeaf(Row::from_leaf_cell(bytes)?)),
            PageType::InteriorTable => Ok(Cell::TableInterior(TableInteriorCell::decode(bytes)?)),
            PageType::LeafIndex => Ok(Cell::IndexLeaf(IndexEntry::from_leaf_cell(bytes)?)),
            PageType::InteriorIndex => {
                let (left_child, entry) = IndexEntry::from_interior_cell(bytes)?;
                Ok(Cell::IndexInterior { left_child, entry })
            }
        }
    }

    /// Sort key of the cell rendered for diagnostics
    pub fn key_label(&self) -> String {
        match self {
            Cell::TableLeaf(row) => row.row_id.map_or_else(|| "?".to_string(), |id| id.to_string()),
            Cell::TableInterior(cell) => cell.row_id.to_string(),
            Cell::IndexLeaf(entry) | Cell::IndexInterior { entry, .. } => entry.key.to_string(),
        }
    }
}
