use std::{cmp::Ordering, collections::BTreeSet, path::Path};

use tracing::debug;

use crate::{
    executor::predicate::ComparisonOp,
    storage::{
        bplus_tree::ROOT_PAGE_ID,
        btree::{self, PageSummary, Propagation, TreeStats, corrupt},
        pager::Pager,
    },
    types::{
        MAX_CELL_SIZE, PageId, RowId,
        entry::{IndexEntry, leaf_to_interior},
        error::DatabaseError,
        page::{Page, PageType},
        value::{DataType, Value},
    },
};

/// A secondary index on one column, stored as a B-tree of `IndexEntry`.
///
/// Interior cells carry real entries: everything under a cell's left child
/// sorts before its key and everything under the next slot sorts after it.
pub struct IndexTree {
    pager: Pager,
    key_type: DataType,
}

/// Where a key lives, or where it would be inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Location {
    page_id: PageId,
    index: usize,
    found: bool,
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, DatabaseError> {
    a.partial_cmp(b).ok_or_else(|| DatabaseError::TypeMismatch {
        expected: a.data_type().to_string(),
        actual: b.data_type().to_string(),
    })
}

fn decode_entry(page: &Page, index: usize) -> Result<IndexEntry, DatabaseError> {
    let cell = page.cell(index)?;
    if page.is_leaf() {
        IndexEntry::from_leaf_cell(cell)
    } else {
        Ok(IndexEntry::from_interior_cell(cell)?.1)
    }
}

impl IndexTree {
    pub fn create<P: AsRef<Path>>(path: P, key_type: DataType) -> Result<Self, DatabaseError> {
        Ok(Self {
            pager: Pager::create(path, PageType::LeafIndex)?,
            key_type,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P, key_type: DataType) -> Result<Self, DatabaseError> {
        let mut pager = Pager::open(path)?;
        if !pager.load_page(ROOT_PAGE_ID)?.page_type.is_index() {
            return Err(corrupt(ROOT_PAGE_ID, "file holds a table, not an index"));
        }
        Ok(Self { pager, key_type })
    }

    pub fn key_type(&self) -> DataType {
        self.key_type
    }

    pub fn page_count(&self) -> u32 {
        self.pager.page_count()
    }

    pub fn read_page(&mut self, page_id: PageId) -> Result<Page, DatabaseError> {
        self.pager.read_page(page_id)
    }

    fn locate(&mut self, key: &Value) -> Result<Location, DatabaseError> {
        let mut page_id = ROOT_PAGE_ID;
        loop {
            let page = self.pager.load_page(page_id)?;
            let mut next = None;
            for index in 0..page.cell_count() {
                let entry = decode_entry(page, index)?;
                match compare(&entry.key, key)? {
                    Ordering::Equal => {
                        return Ok(Location {
                            page_id,
                            index,
                            found: true,
                        });
                    }
                    Ordering::Greater if page.is_leaf() => {
                        return Ok(Location {
                            page_id,
                            index,
                            found: false,
                        });
                    }
                    Ordering::Greater => {
                        next = Some(page.left_child(index)?);
                        break;
                    }
                    Ordering::Less => {}
                }
            }
            page_id = match next {
                Some(child) => child,
                None if page.is_leaf() => {
                    return Ok(Location {
                        page_id,
                        index: page.cell_count(),
                        found: false,
                    });
                }
                None => page
                    .right_pointer()
                    .ok_or_else(|| corrupt(page_id, "interior page without rightmost child"))?,
            };
        }
    }

    fn normalize(&self, key: &Value) -> Result<Value, DatabaseError> {
        key.cast(self.key_type)
    }

    fn check_size(entry: &IndexEntry) -> Result<(), DatabaseError> {
        let size = entry.to_interior_cell(ROOT_PAGE_ID)?.len();
        if size > MAX_CELL_SIZE {
            return Err(DatabaseError::IndexEntryFull {
                key: entry.key.to_string(),
            });
        }
        Ok(())
    }

    /// Fails with `IndexEntryFull` when `insert(key, row_id)` would overflow
    /// the entry for `key`; writes nothing.
    pub fn check_insert(&mut self, key: &Value, row_id: RowId) -> Result<(), DatabaseError> {
        if key.is_null() {
            return Ok(());
        }
        let key = self.normalize(key)?;
        let location = self.locate(&key)?;
        let entry = if location.found {
            let page = self.pager.load_page(location.page_id)?;
            let mut entry = decode_entry(page, location.index)?;
            if !entry.add_row_id(row_id)? {
                return Ok(());
            }
            entry
        } else {
            IndexEntry::new(key, row_id)
        };
        Self::check_size(&entry)
    }

    /// Associate `row_id` with `key`. NULL keys are not indexed.
    /// Returns whether the index changed.
    pub fn insert(&mut self, key: &Value, row_id: RowId) -> Result<bool, DatabaseError> {
        if key.is_null() {
            return Ok(false);
        }
        let key = self.normalize(key)?;
        let location = self.locate(&key)?;
        let mut page = self.pager.read_page(location.page_id)?;

        if location.found {
            let mut entry = decode_entry(&page, location.index)?;
            if !entry.add_row_id(row_id)? {
                return Ok(false);
            }
            Self::check_size(&entry)?;
            let cell = if page.is_leaf() {
                entry.to_leaf_cell()?
            } else {
                entry.to_interior_cell(page.left_child(location.index)?)?
            };
            return match page.update_cell(location.index, &cell) {
                Ok(()) => self.pager.write_page(&page).map(|_| true),
                Err(DatabaseError::PageFull { .. }) => {
                    let mut cells = page.cells();
                    cells[location.index] = cell;
                    let step = if page.is_leaf() {
                        self.split_leaf(page, cells)?
                    } else {
                        btree::split_interior(&mut self.pager, page, cells)?
                    };
                    btree::propagate(&mut self.pager, step).map(|_| true)
                }
                Err(err) => Err(err),
            };
        }

        let entry = IndexEntry::new(key, row_id);
        Self::check_size(&entry)?;
        let cell = entry.to_leaf_cell()?;
        match page.insert_cell(location.index, &cell) {
            Ok(()) => self.pager.write_page(&page).map(|_| true),
            Err(DatabaseError::PageFull { .. }) => {
                let mut cells = page.cells();
                cells.insert(location.index, cell);
                let step = self.split_leaf(page, cells)?;
                btree::propagate(&mut self.pager, step).map(|_| true)
            }
            Err(err) => Err(err),
        }
    }

    /// Split an overflowing leaf, promoting its median entry
    fn split_leaf(&mut self, mut page: Page, cells: Vec<Vec<u8>>) -> Result<Propagation, DatabaseError> {
        let mid = btree::choose_split(&cells, cells.len() / 2, true, page.page_id)?;
        debug!(
            page_id = page.page_id,
            cells = cells.len(),
            mid,
            root = page.is_root(),
            "splitting index leaf"
        );

        match page.parent() {
            None => {
                let left_id = self.pager.append_page(PageType::LeafIndex, None, Some(page.page_id))?;
                let right_id =
                    self.pager
                        .append_page(PageType::LeafIndex, page.right_pointer(), Some(page.page_id))?;
                let mut left = self.pager.read_page(left_id)?;
                left.replace_cells(&cells[..mid])?;
                left.set_right_pointer(Some(right_id));
                self.pager.write_page(&left)?;
                btree::fill_page(&mut self.pager, right_id, &cells[mid + 1..])?;

                page.set_page_type(PageType::InteriorIndex);
                page.replace_cells(&[leaf_to_interior(&cells[mid], left_id)])?;
                page.set_right_pointer(Some(right_id));
                self.pager.write_page(&page)?;
                Ok(Propagation::Done)
            }
            Some(parent_id) => {
                let right_id =
                    self.pager
                        .append_page(PageType::LeafIndex, page.right_pointer(), Some(parent_id))?;
                btree::fill_page(&mut self.pager, right_id, &cells[mid + 1..])?;

                page.replace_cells(&cells[..mid])?;
                page.set_right_pointer(Some(right_id));
                self.pager.write_page(&page)?;
                Ok(Propagation::Promote {
                    parent: parent_id,
                    left: page.page_id,
                    separator: leaf_to_interior(&cells[mid], page.page_id),
                    right: right_id,
                })
            }
        }
    }

    /// Row ids stored under `key`, in insertion order
    pub fn lookup(&mut self, key: &Value) -> Result<Vec<RowId>, DatabaseError> {
        if key.is_null() {
            return Ok(Vec::new());
        }
        let key = self.normalize(key)?;
        let location = self.locate(&key)?;
        if !location.found {
            return Ok(Vec::new());
        }
        let page = self.pager.load_page(location.page_id)?;
        Ok(decode_entry(page, location.index)?.row_ids)
    }

    /// Every entry in key order
    pub fn entries(&mut self) -> Result<Vec<IndexEntry>, DatabaseError> {
        let mut entries = Vec::new();
        self.collect(ROOT_PAGE_ID, &mut entries)?;
        Ok(entries)
    }

    fn collect(&mut self, page_id: PageId, out: &mut Vec<IndexEntry>) -> Result<(), DatabaseError> {
        let page = self.pager.read_page(page_id)?;
        if page.is_leaf() {
            for index in 0..page.cell_count() {
                out.push(decode_entry(&page, index)?);
            }
            return Ok(());
        }
        for index in 0..page.cell_count() {
            self.collect(page.left_child(index)?, out)?;
            out.push(decode_entry(&page, index)?);
        }
        let rightmost = page
            .right_pointer()
            .ok_or_else(|| corrupt(page_id, "interior page without rightmost child"))?;
        self.collect(rightmost, out)
    }

    /// Row ids of every entry whose key satisfies `matches`, in key order
    pub fn matching<F>(&mut self, matches: F) -> Result<Vec<RowId>, DatabaseError>
    where
        F: Fn(&Value) -> bool,
    {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| matches(&entry.key))
            .flat_map(|entry| entry.row_ids)
            .collect())
    }

    /// Row ids whose key compares to `key` as `op` requires
    pub fn range(&mut self, op: ComparisonOp, key: &Value) -> Result<Vec<RowId>, DatabaseError> {
        if key.is_null() {
            return Ok(Vec::new());
        }
        if op == ComparisonOp::Equal {
            return self.lookup(key);
        }
        let key = self.normalize(key)?;
        self.matching(|stored| {
            stored
                .partial_cmp(&key)
                .is_some_and(|ordering| op.matches(ordering))
        })
    }

    /// Drop `row_id` from `key`'s list. Returns whether anything was removed.
    pub fn remove(&mut self, key: &Value, row_id: RowId) -> Result<bool, DatabaseError> {
        if key.is_null() {
            return Ok(false);
        }
        let key = self.normalize(key)?;
        let location = self.locate(&key)?;
        if !location.found {
            return Ok(false);
        }
        let mut page = self.pager.read_page(location.page_id)?;
        let mut entry = decode_entry(&page, location.index)?;
        if !entry.remove_row_id(row_id) {
            return Ok(false);
        }

        if !entry.row_ids.is_empty() {
            let cell = if page.is_leaf() {
                entry.to_leaf_cell()?
            } else {
                entry.to_interior_cell(page.left_child(location.index)?)?
            };
            page.update_cell(location.index, &cell)?;
            self.pager.write_page(&page)?;
            return Ok(true);
        }

        let mut discarded = BTreeSet::new();
        let leaf_id = if page.is_leaf() {
            page.delete_cell(location.index)?;
            self.pager.write_page(&page)?;
            page.page_id
        } else {
            self.replace_with_predecessor(page, location.index)?
        };
        let new_root = btree::rebalance(&mut self.pager, leaf_id, &mut discarded)?;
        if !discarded.is_empty() || new_root.is_some() {
            btree::renumber(&mut self.pager, new_root.unwrap_or(ROOT_PAGE_ID))?;
        }
        Ok(true)
    }

    /// Overwrite interior cell `index` with the largest entry of its left
    /// subtree, taken out of its leaf. Returns that leaf.
    fn replace_with_predecessor(&mut self, page: Page, index: usize) -> Result<PageId, DatabaseError> {
        let left_child = page.left_child(index)?;
        let mut leaf_id = left_child;
        loop {
            let candidate = self.pager.load_page(leaf_id)?;
            if candidate.is_leaf() {
                break;
            }
            leaf_id = candidate
                .right_pointer()
                .ok_or_else(|| corrupt(leaf_id, "interior page without rightmost child"))?;
        }

        let mut leaf = self.pager.read_page(leaf_id)?;
        let last = leaf
            .cell_count()
            .checked_sub(1)
            .ok_or_else(|| corrupt(leaf_id, "non-root leaf holds no cells"))?;
        let predecessor = leaf.delete_cell(last)?;
        self.pager.write_page(&leaf)?;
        debug!(page_id = page.page_id, index, leaf_id, "replacing interior entry with predecessor");
        btree::update_or_split(&mut self.pager, page, index, leaf_to_interior(&predecessor, left_child))?;
        Ok(leaf_id)
    }

    pub fn read_all_pages(&mut self) -> Result<Vec<PageSummary>, DatabaseError> {
        btree::summarize(&mut self.pager, ROOT_PAGE_ID)
    }

    /// Structural checks plus strictly increasing keys in order
    pub fn validate(&mut self) -> Result<TreeStats, DatabaseError> {
        let stats = btree::check_links(&mut self.pager, ROOT_PAGE_ID)?;
        let entries = self.entries()?;
        for pair in entries.windows(2) {
            if compare(&pair[0].key, &pair[1].key)? != Ordering::Less {
                return Err(corrupt(
                    ROOT_PAGE_ID,
                    format!("key {} does not precede {}", pair[0].key, pair[1].key),
                ));
            }
        }
        if entries.iter().any(|entry| entry.row_ids.is_empty()) {
            return Err(corrupt(ROOT_PAGE_ID, "entry without row ids"));
        }
        Ok(stats)
    }
}
