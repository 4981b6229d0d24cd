use std::{collections::BTreeSet, path::Path};

use tracing::debug;

use crate::{
    storage::{
        btree::{self, PageSummary, Propagation, TreeStats, corrupt},
        pager::Pager,
    },
    types::{
        MAX_CELL_SIZE, PageId, RowId,
        cell::TableInteriorCell,
        error::DatabaseError,
        page::{Page, PageType},
        row::Row,
        value::{DataType, Value},
    },
};

/// The root of every tree lives in the first page of its file.
pub const ROOT_PAGE_ID: PageId = 0;

/// A table stored as a B+ tree keyed by row id.
///
/// Rows live in leaf pages chained through their right-sibling pointers.
/// Interior cells hold `(left_child, separator)` where every row id under
/// `left_child` is below `separator` and every row id to its right is at
/// least `separator`.
pub struct TableTree {
    pager: Pager,
    root_page_id: PageId,
}

impl TableTree {
    /// Create an empty table file; fails if the file already exists
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        Ok(Self {
            pager: Pager::create(path, PageType::LeafTable)?,
            root_page_id: ROOT_PAGE_ID,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let mut pager = Pager::open(path)?;
        let root = pager.load_page(ROOT_PAGE_ID)?;
        if root.page_type.is_index() {
            return Err(corrupt(ROOT_PAGE_ID, "file holds an index, not a table"));
        }
        Ok(Self {
            pager,
            root_page_id: ROOT_PAGE_ID,
        })
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn page_count(&self) -> u32 {
        self.pager.page_count()
    }

    pub fn read_page(&mut self, page_id: PageId) -> Result<Page, DatabaseError> {
        self.pager.read_page(page_id)
    }

    fn child_for(page: &Page, row_id: RowId) -> Result<PageId, DatabaseError> {
        for index in 0..page.cell_count() {
            let cell = TableInteriorCell::decode(page.cell(index)?)?;
            if cell.row_id > row_id {
                return Ok(cell.left_child);
            }
        }
        page.right_pointer()
            .ok_or_else(|| corrupt(page.page_id, "interior page without rightmost child"))
    }

    /// Leaf whose key range covers `row_id`
    pub fn find_leaf(&mut self, row_id: RowId) -> Result<PageId, DatabaseError> {
        let mut page_id = self.root_page_id;
        loop {
            let page = self.pager.load_page(page_id)?;
            if page.is_leaf() {
                return Ok(page_id);
            }
            page_id = Self::child_for(page, row_id)?;
        }
    }

    pub fn leftmost_leaf(&mut self) -> Result<PageId, DatabaseError> {
        let mut page_id = self.root_page_id;
        loop {
            let page = self.pager.load_page(page_id)?;
            if page.is_leaf() {
                return Ok(page_id);
            }
            page_id = if page.cell_count() > 0 {
                page.left_child(0)?
            } else {
                page.right_pointer()
                    .ok_or_else(|| corrupt(page_id, "interior page without children"))?
            };
        }
    }

    pub fn rightmost_leaf(&mut self) -> Result<PageId, DatabaseError> {
        let mut page_id = self.root_page_id;
        loop {
            let page = self.pager.load_page(page_id)?;
            if page.is_leaf() {
                return Ok(page_id);
            }
            page_id = page
                .right_pointer()
                .ok_or_else(|| corrupt(page_id, "interior page without rightmost child"))?;
        }
    }

    pub fn max_row_id(&mut self) -> Result<Option<RowId>, DatabaseError> {
        let leaf_id = self.rightmost_leaf()?;
        let leaf = self.pager.load_page(leaf_id)?;
        match leaf.cell_count() {
            0 => Ok(None),
            count => Ok(Some(Row::leaf_cell_row_id(leaf.cell(count - 1)?)?)),
        }
    }

    /// One past the largest row id in the rightmost leaf; 1 for an empty tree
    pub fn next_row_id(&mut self) -> Result<RowId, DatabaseError> {
        Ok(self.max_row_id()?.unwrap_or(0) + 1)
    }

    /// Encode `values` under a fresh row id and append them
    pub fn insert(&mut self, values: Vec<Value>, schema: &[DataType]) -> Result<RowId, DatabaseError> {
        let row_id = self.next_row_id()?;
        let cell = Row::with_row_id(row_id, values).to_leaf_cell(schema)?;
        self.insert_cell(row_id, cell)?;
        Ok(row_id)
    }

    /// Append an encoded leaf cell; `row_id` must exceed every stored row id
    pub fn insert_cell(&mut self, row_id: RowId, cell: Vec<u8>) -> Result<(), DatabaseError> {
        if cell.len() > MAX_CELL_SIZE {
            return Err(DatabaseError::RowTooLarge {
                size: cell.len(),
                max: MAX_CELL_SIZE,
            });
        }
        if let Some(max) = self.max_row_id()? {
            if row_id <= max {
                return Err(DatabaseError::InvalidData {
                    details: format!("row id {} is not above the current maximum {}", row_id, max),
                });
            }
        }

        let leaf_id = self.rightmost_leaf()?;
        let mut leaf = self.pager.read_page(leaf_id)?;
        match leaf.append_cell(&cell) {
            Ok(()) => self.pager.write_page(&leaf),
            Err(DatabaseError::PageFull { .. }) => {
                let existing = leaf.cell_count();
                let mut cells = leaf.cells();
                cells.push(cell);
                let step = self.split_leaf(leaf, cells, existing)?;
                btree::propagate(&mut self.pager, step)
            }
            Err(err) => Err(err),
        }
    }

    fn split_leaf(
        &mut self,
        mut page: Page,
        cells: Vec<Vec<u8>>,
        existing: usize,
    ) -> Result<Propagation, DatabaseError> {
        let mid = btree::choose_split(&cells, existing.div_ceil(2).max(1), false, page.page_id)?;
        let separator = Row::leaf_cell_row_id(&cells[mid])?;
        debug!(
            page_id = page.page_id,
            cells = cells.len(),
            separator,
            root = page.is_root(),
            "splitting table leaf"
        );

        match page.parent() {
            None => {
                let left_id = self.pager.append_page(PageType::LeafTable, None, Some(page.page_id))?;
                let right_id =
                    self.pager
                        .append_page(PageType::LeafTable, page.right_pointer(), Some(page.page_id))?;
                let mut left = self.pager.read_page(left_id)?;
                left.replace_cells(&cells[..mid])?;
                left.set_right_pointer(Some(right_id));
                self.pager.write_page(&left)?;
                btree::fill_page(&mut self.pager, right_id, &cells[mid..])?;

                page.set_page_type(PageType::InteriorTable);
                page.replace_cells(&[TableInteriorCell::new(left_id, separator).encode()])?;
                page.set_right_pointer(Some(right_id));
                self.pager.write_page(&page)?;
                Ok(Propagation::Done)
            }
            Some(parent_id) => {
                let right_id =
                    self.pager
                        .append_page(PageType::LeafTable, page.right_pointer(), Some(parent_id))?;
                btree::fill_page(&mut self.pager, right_id, &cells[mid..])?;

                page.replace_cells(&cells[..mid])?;
                page.set_right_pointer(Some(right_id));
                self.pager.write_page(&page)?;
                Ok(Propagation::Promote {
                    parent: parent_id,
                    left: page.page_id,
                    separator: TableInteriorCell::new(page.page_id, separator).encode(),
                    right: right_id,
                })
            }
        }
    }

    fn position_in_leaf(leaf: &Page, row_id: RowId) -> Result<Option<usize>, DatabaseError> {
        for index in 0..leaf.cell_count() {
            if Row::leaf_cell_row_id(leaf.cell(index)?)? == row_id {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    pub fn get(&mut self, row_id: RowId) -> Result<Option<Row>, DatabaseError> {
        let leaf_id = self.find_leaf(row_id)?;
        let leaf = self.pager.load_page(leaf_id)?;
        match Self::position_in_leaf(leaf, row_id)? {
            Some(index) => Ok(Some(Row::from_leaf_cell(leaf.cell(index)?)?)),
            None => Ok(None),
        }
    }

    /// Like `get`, but an absent row is an error
    pub fn fetch(&mut self, row_id: RowId) -> Result<Row, DatabaseError> {
        self.get(row_id)?.ok_or_else(|| DatabaseError::KeyNotFound {
            key: row_id.to_string(),
        })
    }

    /// Rows of one leaf and the next leaf in the chain
    pub fn read_leaf(&mut self, page_id: PageId) -> Result<(Vec<Row>, Option<PageId>), DatabaseError> {
        let page = self.pager.load_page(page_id)?;
        if !page.is_leaf() {
            return Err(corrupt(page_id, "expected a leaf page"));
        }
        let rows = page
            .cells()
            .iter()
            .map(|cell| Row::from_leaf_cell(cell))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rows, page.right_pointer()))
    }

    /// All rows in row id order, following the leaf chain
    pub fn scan(&mut self) -> Result<Vec<Row>, DatabaseError> {
        let mut rows = Vec::new();
        let mut next = Some(self.leftmost_leaf()?);
        while let Some(page_id) = next {
            let (mut leaf_rows, right) = self.read_leaf(page_id)?;
            rows.append(&mut leaf_rows);
            next = right;
        }
        Ok(rows)
    }

    pub fn delete(&mut self, row_id: RowId) -> Result<Option<Row>, DatabaseError> {
        Ok(self.delete_many(&[row_id])?.pop())
    }

    /// Delete every listed row that exists; absent row ids are skipped.
    /// Returns the removed rows.
    pub fn delete_many(&mut self, row_ids: &[RowId]) -> Result<Vec<Row>, DatabaseError> {
        let mut removed = Vec::new();
        let mut discarded = BTreeSet::new();
        for &row_id in row_ids {
            if let Some(row) = self.remove_row(row_id, &mut discarded)? {
                removed.push(row);
            }
        }
        if !discarded.is_empty() || self.root_page_id != ROOT_PAGE_ID {
            debug!(discarded = discarded.len(), "compacting table file");
            btree::renumber(&mut self.pager, self.root_page_id)?;
            self.root_page_id = ROOT_PAGE_ID;
        }
        Ok(removed)
    }

    fn remove_row(
        &mut self,
        row_id: RowId,
        discarded: &mut BTreeSet<PageId>,
    ) -> Result<Option<Row>, DatabaseError> {
        let leaf_id = self.find_leaf(row_id)?;
        let mut leaf = self.pager.read_page(leaf_id)?;
        let Some(index) = Self::position_in_leaf(&leaf, row_id)? else {
            debug!(row_id, "row not present, nothing to delete");
            return Ok(None);
        };
        let cell = leaf.delete_cell(index)?;
        self.pager.write_page(&leaf)?;
        if let Some(root) = btree::rebalance(&mut self.pager, leaf_id, discarded)? {
            self.root_page_id = root;
        }
        Ok(Some(Row::from_leaf_cell(&cell)?))
    }

    /// Every page reachable from the root with derived sibling links
    pub fn read_all_pages(&mut self) -> Result<Vec<PageSummary>, DatabaseError> {
        btree::summarize(&mut self.pager, self.root_page_id)
    }

    /// Check structure and key ordering, reporting `CorruptTree` on failure
    pub fn validate(&mut self) -> Result<TreeStats, DatabaseError> {
        let stats = btree::check_links(&mut self.pager, self.root_page_id)?;
        self.check_keys(self.root_page_id, None, None)?;
        Ok(stats)
    }

    /// Every row id under `page_id` must lie in `[lower, upper)`
    fn check_keys(
        &mut self,
        page_id: PageId,
        lower: Option<RowId>,
        upper: Option<RowId>,
    ) -> Result<(), DatabaseError> {
        let page = self.pager.read_page(page_id)?;
        let in_range = |key: RowId| lower.is_none_or(|l| key >= l) && upper.is_none_or(|u| key < u);

        if page.is_leaf() {
            let mut previous = None;
            for index in 0..page.cell_count() {
                let row_id = Row::leaf_cell_row_id(page.cell(index)?)?;
                if previous.is_some_and(|p| row_id <= p) || !in_range(row_id) {
                    return Err(corrupt(page_id, format!("row id {} out of order", row_id)));
                }
                previous = Some(row_id);
            }
            return Ok(());
        }

        let mut low = lower;
        for index in 0..page.cell_count() {
            let cell = TableInteriorCell::decode(page.cell(index)?)?;
            if low.is_some_and(|l| cell.row_id < l) || upper.is_some_and(|u| cell.row_id > u) {
                return Err(corrupt(page_id, format!("separator {} out of order", cell.row_id)));
            }
            self.check_keys(cell.left_child, low, Some(cell.row_id))?;
            low = Some(cell.row_id);
        }
        let rightmost = page
            .right_pointer()
            .ok_or_else(|| corrupt(page_id, "interior page without rightmost child"))?;
        self.check_keys(rightmost, low, upper)
    }
}
