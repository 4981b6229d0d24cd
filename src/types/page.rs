use crate::types::{
    CELL_POINTER_SIZE, NO_PAGE, PAGE_HEADER_SIZE, PAGE_SIZE, PageId, error::DatabaseError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    InteriorIndex = 2,
    InteriorTable = 5,
    LeafIndex = 10,
    LeafTable = 13,
}

impl PageType {
    pub fn from_u8(value: u8) -> Result<Self, DatabaseError> {
        match value {
            2 => Ok(PageType::InteriorIndex),
            5 => Ok(PageType::InteriorTable),
            10 => Ok(PageType::LeafIndex),
            13 => Ok(PageType::LeafTable),
            _ => Err(DatabaseError::InvalidPageType(value)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            PageType::InteriorIndex => 2,
            PageType::InteriorTable => 5,
            PageType::LeafIndex => 10,
            PageType::LeafTable => 13,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, PageType::LeafIndex | PageType::LeafTable)
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PageType::LeafIndex | PageType::InteriorIndex)
    }

    /// The interior kind of the same tree family.
    pub fn interior(&self) -> PageType {
        if self.is_index() {
            PageType::InteriorIndex
        } else {
            PageType::InteriorTable
        }
    }
}

/// Direction for in-page byte moves. `Up` moves toward the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    Up,
    Down,
}

const KIND_OFFSET: usize = 0;
const CELL_COUNT_OFFSET: usize = 2;
const CONTENT_START_OFFSET: usize = 4;
const RIGHT_POINTER_OFFSET: usize = 6;
const PARENT_OFFSET: usize = 10;

/*
 * Page Layout on Disk (512 bytes, native byte order)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                    PAGE HEADER (16 bytes)                       │
 * │  kind(1) | reserved(1) | cell_count(2) | content_start(2) |     │
 * │  right_sibling_or_rightmost_child(4) | parent(4) | reserved(2)  │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                  CELL POINTER ARRAY                             │
 * │  [ptr0(2)] [ptr1(2)] ... in key order                           │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    FREE SPACE                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                   CELL CONTENT                                  │
 * │  [...cell N...] ... [...cell 1...] [...cell 0...]  <- byte 512  │
 * └─────────────────────────────────────────────────────────────────┘
 *
 * Cell i occupies [ptr[i], ptr[i-1]) with ptr[-1] = 512.
 */

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_id: PageId,
    pub page_type: PageType,
    pub is_dirty: bool,
    data: Vec<u8>,
}

pub fn encode_page_ref(page: Option<PageId>) -> i32 {
    page.map_or(NO_PAGE, |id| id as i32)
}

pub fn decode_page_ref(raw: i32) -> Option<PageId> {
    if raw < 0 { None } else { Some(raw as PageId) }
}

impl Page {
    pub fn new(
        page_id: PageId,
        page_type: PageType,
        right_pointer: Option<PageId>,
        parent: Option<PageId>,
    ) -> Self {
        let mut page = Self {
            page_id,
            page_type,
            is_dirty: true,
            data: vec![0; PAGE_SIZE],
        };
        page.data[KIND_OFFSET] = page_type.as_u8();
        page.set_cell_count(0);
        page.set_content_start(PAGE_SIZE);
        page.set_right_pointer(right_pointer);
        page.set_parent(parent);
        page
    }

    /// Parse and sanity-check a page read from disk
    pub fn from_bytes(page_id: PageId, bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        let page_type = PageType::from_u8(bytes[KIND_OFFSET])?;
        let page = Self {
            page_id,
            page_type,
            is_dirty: false,
            data: bytes.to_vec(),
        };
        page.check_layout()?;
        Ok(page)
    }

    fn check_layout(&self) -> Result<(), DatabaseError> {
        let corrupted = |reason: String| DatabaseError::CorruptedPage {
            page_id: self.page_id,
            reason,
        };
        let raw_count = self.read_i16(CELL_COUNT_OFFSET);
        let raw_start = self.read_i16(CONTENT_START_OFFSET);
        if raw_count < 0 || raw_start < 0 {
            return Err(corrupted("negative header field".to_string()));
        }
        let count = raw_count as usize;
        let start = raw_start as usize;
        let array_end = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * count;
        if start > PAGE_SIZE || start < array_end {
            return Err(corrupted(format!(
                "content start {} overlaps pointer array ending at {}",
                start, array_end
            )));
        }
        let mut bottom = PAGE_SIZE;
        for index in 0..count {
            let top = self.pointer(index);
            if top >= bottom || top < start {
                return Err(corrupted(format!("cell {} has offset {} out of order", index, top)));
            }
            bottom = top;
        }
        if bottom != start {
            return Err(corrupted("cell content is not packed".to_string()));
        }
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    fn read_i16(&self, offset: usize) -> i16 {
        i16::from_ne_bytes([self.data[offset], self.data[offset + 1]])
    }

    fn write_i16(&mut self, offset: usize, value: i16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_ne_bytes());
    }

    fn read_i32(&self, offset: usize) -> i32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[offset..offset + 4]);
        i32::from_ne_bytes(buf)
    }

    fn write_i32(&mut self, offset: usize, value: i32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }

    // Header accessors

    pub fn cell_count(&self) -> usize {
        self.read_i16(CELL_COUNT_OFFSET).max(0) as usize
    }

    fn set_cell_count(&mut self, count: usize) {
        self.write_i16(CELL_COUNT_OFFSET, count as i16);
    }

    pub fn content_start(&self) -> usize {
        self.read_i16(CONTENT_START_OFFSET).max(0) as usize
    }

    fn set_content_start(&mut self, offset: usize) {
        self.write_i16(CONTENT_START_OFFSET, offset as i16);
    }

    /// Right sibling for leaves, rightmost child for interior pages
    pub fn right_pointer(&self) -> Option<PageId> {
        decode_page_ref(self.read_i32(RIGHT_POINTER_OFFSET))
    }

    pub fn set_right_pointer(&mut self, page: Option<PageId>) {
        self.write_i32(RIGHT_POINTER_OFFSET, encode_page_ref(page));
        self.is_dirty = true;
    }

    pub fn parent(&self) -> Option<PageId> {
        decode_page_ref(self.read_i32(PARENT_OFFSET))
    }

    pub fn set_parent(&mut self, parent: Option<PageId>) {
        self.write_i32(PARENT_OFFSET, encode_page_ref(parent));
        self.is_dirty = true;
    }

    pub fn set_page_type(&mut self, page_type: PageType) {
        self.page_type = page_type;
        self.data[KIND_OFFSET] = page_type.as_u8();
        self.is_dirty = true;
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type.is_leaf()
    }

    // Space accounting

    pub fn available_space(&self) -> usize {
        self.content_start()
            .saturating_sub(PAGE_HEADER_SIZE + CELL_POINTER_SIZE * self.cell_count())
    }

    /// Bytes taken by cell bodies
    pub fn used_bytes(&self) -> usize {
        PAGE_SIZE - self.content_start()
    }

    pub fn can_fit(&self, cell_len: usize) -> bool {
        cell_len + CELL_POINTER_SIZE <= self.available_space()
    }

    /// Whether an empty page could hold all of `cells`
    pub fn fits(cells: &[Vec<u8>]) -> bool {
        let needed: usize = cells.iter().map(|c| c.len() + CELL_POINTER_SIZE).sum();
        PAGE_HEADER_SIZE + needed <= PAGE_SIZE
    }

    // Cell pointer array

    fn pointer(&self, index: usize) -> usize {
        self.read_i16(PAGE_HEADER_SIZE + CELL_POINTER_SIZE * index).max(0) as usize
    }

    fn set_pointer(&mut self, index: usize, offset: usize) {
        self.write_i16(PAGE_HEADER_SIZE + CELL_POINTER_SIZE * index, offset as i16);
    }

    fn cell_bounds(&self, index: usize) -> (usize, usize) {
        let top = self.pointer(index);
        let bottom = if index == 0 { PAGE_SIZE } else { self.pointer(index - 1) };
        (top, bottom)
    }

    fn check_index(&self, index: usize) -> Result<(), DatabaseError> {
        let count = self.cell_count();
        if index >= count {
            return Err(DatabaseError::InvalidCellIndex { index, max: count });
        }
        Ok(())
    }

    pub fn cell(&self, index: usize) -> Result<&[u8], DatabaseError> {
        self.check_index(index)?;
        let (top, bottom) = self.cell_bounds(index);
        Ok(&self.data[top..bottom])
    }

    pub fn cells(&self) -> Vec<Vec<u8>> {
        (0..self.cell_count())
            .map(|index| {
                let (top, bottom) = self.cell_bounds(index);
                self.data[top..bottom].to_vec()
            })
            .collect()
    }

    /// Move `[lo, hi)` by `distance` bytes and zero the vacated bytes
    pub fn shift_content(&mut self, lo: usize, hi: usize, distance: usize, direction: ShiftDirection) {
        if lo >= hi || distance == 0 {
            return;
        }
        match direction {
            ShiftDirection::Up => {
                self.data.copy_within(lo..hi, lo - distance);
                let vacated = hi.saturating_sub(distance).max(lo);
                self.data[vacated..hi].fill(0);
            }
            ShiftDirection::Down => {
                self.data.copy_within(lo..hi, lo + distance);
                let vacated = (lo + distance).min(hi);
                self.data[lo..vacated].fill(0);
            }
        }
        self.is_dirty = true;
    }

    /// Adjust the stored offsets of cells `from_index..` by `distance`
    pub fn shift_pointer_array(&mut self, from_index: usize, distance: usize, direction: ShiftDirection) {
        for index in from_index..self.cell_count() {
            let offset = self.pointer(index);
            let moved = match direction {
                ShiftDirection::Up => offset - distance,
                ShiftDirection::Down => offset + distance,
            };
            self.set_pointer(index, moved);
        }
    }

    /// Insert a cell so that it becomes cell `index`
    pub fn insert_cell(&mut self, index: usize, cell: &[u8]) -> Result<(), DatabaseError> {
        let count = self.cell_count();
        if index > count {
            return Err(DatabaseError::InvalidCellIndex { index, max: count });
        }
        if cell.is_empty() {
            return Err(DatabaseError::InvalidData {
                details: "cannot store an empty cell".to_string(),
            });
        }
        if !self.can_fit(cell.len()) {
            return Err(DatabaseError::PageFull {
                page_id: self.page_id,
            });
        }

        let len = cell.len();
        let start = self.content_start();
        let bottom = if index == 0 { PAGE_SIZE } else { self.pointer(index - 1) };

        // Cells index.. live in [start, bottom); lift them to open the gap.
        self.shift_content(start, bottom, len, ShiftDirection::Up);
        self.shift_pointer_array(index, len, ShiftDirection::Up);

        let array_lo = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * index;
        let array_hi = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * count;
        self.shift_content(array_lo, array_hi, CELL_POINTER_SIZE, ShiftDirection::Down);

        let top = bottom - len;
        self.data[top..bottom].copy_from_slice(cell);
        self.set_pointer(index, top);
        self.set_cell_count(count + 1);
        self.set_content_start(start - len);
        self.is_dirty = true;
        Ok(())
    }

    pub fn append_cell(&mut self, cell: &[u8]) -> Result<(), DatabaseError> {
        self.insert_cell(self.cell_count(), cell)
    }

    /// Remove cell `index`, returning its bytes
    pub fn delete_cell(&mut self, index: usize) -> Result<Vec<u8>, DatabaseError> {
        self.check_index(index)?;
        let count = self.cell_count();
        let (top, bottom) = self.cell_bounds(index);
        let removed = self.data[top..bottom].to_vec();
        let len = bottom - top;
        let start = self.content_start();

        self.shift_content(start, top, len, ShiftDirection::Down);
        self.data[start..start + len].fill(0);
        self.shift_pointer_array(index + 1, len, ShiftDirection::Down);

        let array_lo = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * (index + 1);
        let array_hi = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * count;
        self.shift_content(array_lo, array_hi, CELL_POINTER_SIZE, ShiftDirection::Up);
        let last = PAGE_HEADER_SIZE + CELL_POINTER_SIZE * (count - 1);
        self.data[last..last + CELL_POINTER_SIZE].fill(0);

        self.set_cell_count(count - 1);
        self.set_content_start(start + len);
        self.is_dirty = true;
        Ok(removed)
    }

    /// Replace cell `index`, resizing it in place
    pub fn update_cell(&mut self, index: usize, cell: &[u8]) -> Result<(), DatabaseError> {
        self.check_index(index)?;
        if cell.is_empty() {
            return Err(DatabaseError::InvalidData {
                details: "cannot store an empty cell".to_string(),
            });
        }
        let (top, bottom) = self.cell_bounds(index);
        let old_len = bottom - top;
        let new_len = cell.len();
        let start = self.content_start();

        if new_len > old_len {
            let growth = new_len - old_len;
            if growth > self.available_space() {
                return Err(DatabaseError::PageFull {
                    page_id: self.page_id,
                });
            }
            self.shift_content(start, top, growth, ShiftDirection::Up);
            self.shift_pointer_array(index, growth, ShiftDirection::Up);
            self.set_content_start(start - growth);
        } else if new_len < old_len {
            let shrink = old_len - new_len;
            self.shift_content(start, top, shrink, ShiftDirection::Down);
            self.data[start..start + shrink].fill(0);
            self.shift_pointer_array(index, shrink, ShiftDirection::Down);
            self.set_content_start(start + shrink);
        }

        let new_top = self.pointer(index);
        self.data[new_top..bottom].copy_from_slice(cell);
        self.is_dirty = true;
        Ok(())
    }

    pub fn clear_cells(&mut self) {
        self.data[PAGE_HEADER_SIZE..].fill(0);
        self.set_cell_count(0);
        self.set_content_start(PAGE_SIZE);
        self.is_dirty = true;
    }

    /// Overwrite the page's cells with `cells`, in order
    pub fn replace_cells(&mut self, cells: &[Vec<u8>]) -> Result<(), DatabaseError> {
        self.clear_cells();
        for cell in cells {
            self.append_cell(cell)?;
        }
        Ok(())
    }

    // Interior cells of both tree families start with the left child page.

    pub fn left_child(&self, index: usize) -> Result<PageId, DatabaseError> {
        let cell = self.cell(index)?;
        read_left_child(cell).ok_or_else(|| DatabaseError::CorruptTree {
            page_id: self.page_id,
            reason: format!("cell {} has no left child", index),
        })
    }

    pub fn set_left_child(&mut self, index: usize, child: PageId) -> Result<(), DatabaseError> {
        self.check_index(index)?;
        let (top, bottom) = self.cell_bounds(index);
        if bottom - top < 4 {
            return Err(DatabaseError::CorruptTree {
                page_id: self.page_id,
                reason: format!("cell {} too short for a child pointer", index),
            });
        }
        self.write_i32(top, child as i32);
        self.is_dirty = true;
        Ok(())
    }

    /// Child pages in key order, the rightmost child last
    pub fn children(&self) -> Result<Vec<PageId>, DatabaseError> {
        if self.is_leaf() {
            return Ok(Vec::new());
        }
        let mut children = Vec::with_capacity(self.cell_count() + 1);
        for index in 0..self.cell_count() {
            children.push(self.left_child(index)?);
        }
        if let Some(rightmost) = self.right_pointer() {
            children.push(rightmost);
        }
        Ok(children)
    }

    /// Position of `child` among this page's children; `cell_count()` is the rightmost slot
    pub fn child_position(&self, child: PageId) -> Result<Option<usize>, DatabaseError> {
        Ok(self.children()?.iter().position(|&c| c == child))
    }

    /// Child at a position returned by `child_position`
    pub fn child_at(&self, position: usize) -> Result<Option<PageId>, DatabaseError> {
        if position < self.cell_count() {
            Ok(Some(self.left_child(position)?))
        } else if position == self.cell_count() {
            Ok(self.right_pointer())
        } else {
            Ok(None)
        }
    }
}

/// Left child pointer stored in the first four bytes of an interior cell
pub fn read_left_child(cell: &[u8]) -> Option<PageId> {
    let bytes: [u8; 4] = cell.get(..4)?.try_into().ok()?;
    decode_page_ref(i32::from_ne_bytes(bytes))
}

pub fn write_left_child(cell: &mut [u8], child: PageId) {
    if cell.len() >= 4 {
        cell[..4].copy_from_slice(&(child as i32).to_ne_bytes());
    }
}
