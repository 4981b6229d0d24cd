pub mod cell;
pub mod entry;
pub mod error;
pub mod page;
pub mod row;
pub mod value;

// Common type aliases
pub type PageId = u32;
pub type RowId = i32;

// Page geometry
pub const PAGE_SIZE: usize = 512;
pub const PAGE_HEADER_SIZE: usize = 16;
pub const CELL_POINTER_SIZE: usize = 2; // int16 offset per cell

/// On-disk marker for "no page" in sibling, child and parent fields.
pub const NO_PAGE: i32 = -1;

/// Largest cell accepted by the trees, so that any two cells share a page.
pub const MAX_CELL_SIZE: usize = (PAGE_SIZE - PAGE_HEADER_SIZE) / 2 - CELL_POINTER_SIZE;

/// TEXT type tags are `12 + length` and must fit in one byte.
pub const MAX_TEXT_LENGTH: usize = u8::MAX as usize - 12;
