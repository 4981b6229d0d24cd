use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::{
    storage::pager::Pager,
    types::{
        CELL_POINTER_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, PageId,
        cell::{Cell, TableInteriorCell},
        entry::{interior_to_leaf, leaf_to_interior},
        error::DatabaseError,
        page::{Page, PageType, read_left_child, write_left_child},
        row::Row,
    },
};

/// Non-root pages holding fewer cells than this borrow or merge.
pub(crate) const MIN_CELLS: usize = 2;

/// What a split hands to the level above it
#[derive(Debug)]
pub(crate) enum Propagation {
    Done,
    /// `separator` is an interior cell whose left child is `left`; the
    /// parent slot that pointed at `left` must now point at `right`.
    Promote {
        parent: PageId,
        left: PageId,
        separator: Vec<u8>,
        right: PageId,
    },
}

/// Shape of a tree as seen by `validate`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub depth: usize,
    pub page_count: usize,
    pub interior_count: usize,
    pub leaf_count: usize,
    pub leaf_cell_count: usize,
}

/// One page of a tree with its siblings derived from the parent
#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    pub page_id: PageId,
    pub page_type: PageType,
    pub parent: Option<PageId>,
    pub left_sibling: Option<PageId>,
    pub right_sibling: Option<PageId>,
    pub right_pointer: Option<PageId>,
    pub cell_count: usize,
    pub available_space: usize,
    pub keys: Vec<String>,
}

pub(crate) fn corrupt(page_id: PageId, reason: impl Into<String>) -> DatabaseError {
    DatabaseError::CorruptTree {
        page_id,
        reason: reason.into(),
    }
}

/// Carry promoted separators upward until a parent absorbs one
pub(crate) fn propagate(pager: &mut Pager, mut step: Propagation) -> Result<(), DatabaseError> {
    while let Propagation::Promote {
        parent,
        left,
        separator,
        right,
    } = step
    {
        step = insert_separator(pager, parent, left, separator, right)?;
    }
    Ok(())
}

fn insert_separator(
    pager: &mut Pager,
    parent_id: PageId,
    left: PageId,
    separator: Vec<u8>,
    right: PageId,
) -> Result<Propagation, DatabaseError> {
    let mut parent = pager.read_page(parent_id)?;
    let position = parent
        .child_position(left)?
        .ok_or_else(|| corrupt(parent_id, format!("page {} is not a child", left)))?;
    if position < parent.cell_count() {
        parent.set_left_child(position, right)?;
    } else {
        parent.set_right_pointer(Some(right));
    }

    match parent.insert_cell(position, &separator) {
        Ok(()) => {
            pager.write_page(&parent)?;
            Ok(Propagation::Done)
        }
        Err(DatabaseError::PageFull { .. }) => {
            let mut cells = parent.cells();
            cells.insert(position, separator);
            split_interior(pager, parent, cells)
        }
        Err(err) => Err(err),
    }
}

/// Split an interior page whose desired contents `cells` overflow it.
///
/// The median cell is promoted; its left child becomes the rightmost child
/// of the lower half.
pub(crate) fn split_interior(
    pager: &mut Pager,
    mut page: Page,
    cells: Vec<Vec<u8>>,
) -> Result<Propagation, DatabaseError> {
    let mid = choose_split(&cells, cells.len() / 2, true, page.page_id)?;
    let mut promoted = cells[mid].clone();
    let lower_rightmost = read_left_child(&promoted)
        .ok_or_else(|| corrupt(page.page_id, "promoted cell has no left child"))?;
    let rightmost = page.right_pointer();
    let page_type = page.page_type;

    debug!(
        page_id = page.page_id,
        cells = cells.len(),
        mid,
        root = page.is_root(),
        "splitting interior page"
    );

    match page.parent() {
        None => {
            let left_id = pager.append_page(page_type, Some(lower_rightmost), Some(page.page_id))?;
            let right_id = pager.append_page(page_type, rightmost, Some(page.page_id))?;
            fill_page(pager, left_id, &cells[..mid])?;
            fill_page(pager, right_id, &cells[mid + 1..])?;

            write_left_child(&mut promoted, left_id);
            page.replace_cells(&[promoted])?;
            page.set_right_pointer(Some(right_id));
            pager.write_page(&page)?;
            Ok(Propagation::Done)
        }
        Some(parent_id) => {
            let right_id = pager.append_page(page_type, rightmost, Some(parent_id))?;
            fill_page(pager, right_id, &cells[mid + 1..])?;

            page.replace_cells(&cells[..mid])?;
            page.set_right_pointer(Some(lower_rightmost));
            pager.write_page(&page)?;
            reparent_children(pager, &page)?;

            write_left_child(&mut promoted, page.page_id);
            Ok(Propagation::Promote {
                parent: parent_id,
                left: page.page_id,
                separator: promoted,
                right: right_id,
            })
        }
    }
}

/// Write `cells` into an already allocated page and adopt its children
pub(crate) fn fill_page(
    pager: &mut Pager,
    page_id: PageId,
    cells: &[Vec<u8>],
) -> Result<Page, DatabaseError> {
    let mut page = pager.read_page(page_id)?;
    page.replace_cells(cells)?;
    pager.write_page(&page)?;
    reparent_children(pager, &page)?;
    Ok(page)
}

pub(crate) fn reparent_children(pager: &mut Pager, page: &Page) -> Result<(), DatabaseError> {
    for child_id in page.children()? {
        let mut child = pager.read_page(child_id)?;
        if child.parent() != Some(page.page_id) {
            child.set_parent(Some(page.page_id));
            pager.write_page(&child)?;
        }
    }
    Ok(())
}

/// Pick a split position near `preferred` where both halves fit a page.
///
/// With `promote` the cell at the split position leaves both halves.
pub(crate) fn choose_split(
    cells: &[Vec<u8>],
    preferred: usize,
    promote: bool,
    page_id: PageId,
) -> Result<usize, DatabaseError> {
    let len = cells.len();
    let valid = |mid: usize| {
        let upper_start = if promote { mid + 1 } else { mid };
        mid >= 1
            && upper_start < len
            && Page::fits(&cells[..mid])
            && Page::fits(&cells[upper_start..])
    };
    for delta in 0..len {
        let above = preferred + delta;
        if valid(above) {
            return Ok(above);
        }
        if let Some(below) = preferred.checked_sub(delta) {
            if valid(below) {
                return Ok(below);
            }
        }
    }
    Err(DatabaseError::PageFull { page_id })
}

/// Overwrite cell `index` of an interior page, splitting the page when the
/// new cell no longer fits.
pub(crate) fn update_or_split(
    pager: &mut Pager,
    mut page: Page,
    index: usize,
    cell: Vec<u8>,
) -> Result<(), DatabaseError> {
    match page.update_cell(index, &cell) {
        Ok(()) => pager.write_page(&page),
        Err(DatabaseError::PageFull { .. }) => {
            let mut cells = page.cells();
            cells[index] = cell;
            let step = split_interior(pager, page, cells)?;
            propagate(pager, step)
        }
        Err(err) => Err(err),
    }
}

fn with_left_child(cell: &[u8], child: PageId) -> Vec<u8> {
    let mut cell = cell.to_vec();
    write_left_child(&mut cell, child);
    cell
}

fn rightmost_child(page: &Page) -> Result<PageId, DatabaseError> {
    page.right_pointer()
        .ok_or_else(|| corrupt(page.page_id, "interior page without rightmost child"))
}

/// Separator in the parent for a table leaf starting with `first_cell`
fn table_separator(first_cell: &[u8], left_child: PageId) -> Result<Vec<u8>, DatabaseError> {
    Ok(TableInteriorCell::new(left_child, Row::leaf_cell_row_id(first_cell)?).encode())
}

/// Walk up from `start` fixing underfull pages by borrowing or merging.
///
/// Table leaves copy their separators up; every other page kind moves the
/// separator between parent and child. Returns the new root when an empty
/// interior root was collapsed into its only child.
pub(crate) fn rebalance(
    pager: &mut Pager,
    start: PageId,
    discarded: &mut BTreeSet<PageId>,
) -> Result<Option<PageId>, DatabaseError> {
    let mut current = start;
    loop {
        let page = pager.read_page(current)?;
        let Some(parent_id) = page.parent() else {
            if !page.is_leaf() && page.cell_count() == 0 {
                return collapse_root(pager, page, discarded).map(Some);
            }
            return Ok(None);
        };
        if page.cell_count() >= MIN_CELLS {
            return Ok(None);
        }

        let parent = pager.read_page(parent_id)?;
        let position = parent
            .child_position(current)?
            .ok_or_else(|| corrupt(parent_id, format!("page {} is not a child", current)))?;
        let left = match position {
            0 => None,
            _ => parent.child_at(position - 1)?,
        };
        let right = parent.child_at(position + 1)?;

        if let Some(left_id) = left {
            if pager.load_page(left_id)?.cell_count() > MIN_CELLS {
                return borrow_from_left(pager, parent, position, left_id, page).map(|_| None);
            }
        }
        if let Some(right_id) = right {
            if pager.load_page(right_id)?.cell_count() > MIN_CELLS {
                return borrow_from_right(pager, parent, position, right_id, page).map(|_| None);
            }
        }

        let merged = match (left, right) {
            (Some(left_id), _) => merge(pager, parent.clone(), position - 1, left_id, current, discarded)?,
            (None, Some(right_id)) => merge(pager, parent.clone(), position, current, right_id, discarded)?,
            (None, None) => false,
        };
        if merged {
            current = parent_id;
            continue;
        }
        // An empty page cannot stay in the tree; a sibling too full to
        // merge with holds enough to lend one cell.
        match (page.cell_count(), left, right) {
            (0, Some(left_id), _) => {
                return borrow_from_left(pager, parent, position, left_id, page).map(|_| None);
            }
            (0, None, Some(right_id)) => {
                return borrow_from_right(pager, parent, position, right_id, page).map(|_| None);
            }
            _ => {
                warn!(page_id = current, cells = page.cell_count(), "left underfull page in place");
                return Ok(None);
            }
        }
    }
}

/// Rotate the last cell of `left_id` through the parent into `page`
fn borrow_from_left(
    pager: &mut Pager,
    parent: Page,
    position: usize,
    left_id: PageId,
    mut page: Page,
) -> Result<(), DatabaseError> {
    let mut left = pager.read_page(left_id)?;
    let separator_index = position - 1;
    let separator = parent.cell(separator_index)?.to_vec();
    let moved = left.delete_cell(left.cell_count() - 1)?;

    let new_separator = match page.page_type {
        PageType::LeafTable => {
            page.insert_cell(0, &moved)?;
            table_separator(&moved, left_id)?
        }
        PageType::LeafIndex => {
            page.insert_cell(0, &interior_to_leaf(&separator))?;
            leaf_to_interior(&moved, left_id)
        }
        PageType::InteriorTable | PageType::InteriorIndex => {
            page.insert_cell(0, &with_left_child(&separator, rightmost_child(&left)?))?;
            let moved_child = read_left_child(&moved)
                .ok_or_else(|| corrupt(left_id, "interior cell without left child"))?;
            left.set_right_pointer(Some(moved_child));
            with_left_child(&moved, left_id)
        }
    };

    pager.write_page(&left)?;
    pager.write_page(&page)?;
    reparent_children(pager, &page)?;
    update_or_split(pager, parent, separator_index, new_separator)?;
    debug!(page_id = page.page_id, from = left_id, "borrowed from left sibling");
    Ok(())
}

/// Rotate the first cell of `right_id` through the parent into `page`
fn borrow_from_right(
    pager: &mut Pager,
    parent: Page,
    position: usize,
    right_id: PageId,
    mut page: Page,
) -> Result<(), DatabaseError> {
    let mut right = pager.read_page(right_id)?;
    let separator = parent.cell(position)?.to_vec();
    let moved = right.delete_cell(0)?;

    let new_separator = match page.page_type {
        PageType::LeafTable => {
            page.append_cell(&moved)?;
            table_separator(right.cell(0)?, page.page_id)?
        }
        PageType::LeafIndex => {
            page.append_cell(&interior_to_leaf(&separator))?;
            leaf_to_interior(&moved, page.page_id)
        }
        PageType::InteriorTable | PageType::InteriorIndex => {
            page.append_cell(&with_left_child(&separator, rightmost_child(&page)?))?;
            let moved_child = read_left_child(&moved)
                .ok_or_else(|| corrupt(right_id, "interior cell without left child"))?;
            page.set_right_pointer(Some(moved_child));
            with_left_child(&moved, page.page_id)
        }
    };

    pager.write_page(&right)?;
    pager.write_page(&page)?;
    reparent_children(pager, &page)?;
    update_or_split(pager, parent, position, new_separator)?;
    debug!(page_id = page.page_id, from = right_id, "borrowed from right sibling");
    Ok(())
}

/// Fold `right_id` into `left_id`, its neighbour under the same parent.
/// Returns false when the combined cells would not fit one page.
fn merge(
    pager: &mut Pager,
    mut parent: Page,
    separator_index: usize,
    left_id: PageId,
    right_id: PageId,
    discarded: &mut BTreeSet<PageId>,
) -> Result<bool, DatabaseError> {
    let mut left = pager.read_page(left_id)?;
    let right = pager.read_page(right_id)?;
    let separator = parent.cell(separator_index)?;

    let mut cells = left.cells();
    match left.page_type {
        PageType::LeafTable => {}
        PageType::LeafIndex => cells.push(interior_to_leaf(separator)),
        PageType::InteriorTable | PageType::InteriorIndex => {
            cells.push(with_left_child(separator, rightmost_child(&left)?));
        }
    }
    cells.extend(right.cells());
    if !Page::fits(&cells) {
        return Ok(false);
    }

    left.replace_cells(&cells)?;
    left.set_right_pointer(right.right_pointer());
    pager.write_page(&left)?;
    reparent_children(pager, &left)?;

    parent.delete_cell(separator_index)?;
    if separator_index < parent.cell_count() {
        parent.set_left_child(separator_index, left_id)?;
    } else {
        parent.set_right_pointer(Some(left_id));
    }
    pager.write_page(&parent)?;
    discarded.insert(right_id);
    debug!(left_id, right_id, cells = cells.len(), "merged sibling pages");
    Ok(true)
}

/// An interior root left with one child hands the root role to it
fn collapse_root(
    pager: &mut Pager,
    root: Page,
    discarded: &mut BTreeSet<PageId>,
) -> Result<PageId, DatabaseError> {
    let child_id = root
        .right_pointer()
        .ok_or_else(|| corrupt(root.page_id, "empty interior root without child"))?;
    let mut child = pager.read_page(child_id)?;
    child.set_parent(None);
    pager.write_page(&child)?;
    discarded.insert(root.page_id);
    debug!(old_root = root.page_id, new_root = child_id, "collapsed root");
    Ok(child_id)
}

/// Rewrite the tree under `root` breadth-first into pages 0..n
pub(crate) fn renumber(pager: &mut Pager, root: PageId) -> Result<(), DatabaseError> {
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);
    let mut seen = HashSet::new();
    while let Some(page_id) = queue.pop_front() {
        if !seen.insert(page_id) {
            return Err(corrupt(page_id, "page reachable twice"));
        }
        let page = pager.read_page(page_id)?;
        queue.extend(page.children()?);
        order.push(page);
    }

    let mapping: HashMap<PageId, PageId> = order
        .iter()
        .enumerate()
        .map(|(new_id, page)| (page.page_id, new_id as PageId))
        .collect();
    let remap = |old: PageId| {
        mapping
            .get(&old)
            .copied()
            .ok_or_else(|| corrupt(old, "reference to a page outside the tree"))
    };

    let mut pages = Vec::with_capacity(order.len());
    for mut page in order {
        let old_id = page.page_id;
        page.page_id = remap(old_id)?;
        let parent = page.parent().map(remap).transpose()?;
        page.set_parent(parent);
        let right = page.right_pointer().map(remap).transpose()?;
        page.set_right_pointer(right);
        if !page.is_leaf() {
            for index in 0..page.cell_count() {
                let child = remap(page.left_child(index)?)?;
                page.set_left_child(index, child)?;
            }
        }
        pages.push(page);
    }
    debug!(root, pages = pages.len(), "renumbering tree");
    pager.rewrite(pages)
}

/// Structural checks shared by table and index trees: parent pointers,
/// page kinds, equal leaf depth, space accounting and the leaf chain.
pub(crate) fn check_links(pager: &mut Pager, root: PageId) -> Result<TreeStats, DatabaseError> {
    let root_page = pager.read_page(root)?;
    if root_page.parent().is_some() {
        return Err(corrupt(root, "root has a parent"));
    }
    let family_is_index = root_page.page_type.is_index();

    let mut stats = TreeStats::default();
    let mut leaf_depth = None;
    let mut in_order_leaves = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root, 1usize)];

    while let Some((page_id, depth)) = stack.pop() {
        if !visited.insert(page_id) {
            return Err(corrupt(page_id, "page reachable twice"));
        }
        let page = pager.read_page(page_id)?;
        if page.page_type.is_index() != family_is_index {
            return Err(corrupt(page_id, "page kind does not match the tree"));
        }
        let cell_bytes: usize = page.cells().iter().map(Vec::len).sum();
        if PAGE_HEADER_SIZE + CELL_POINTER_SIZE * page.cell_count() + cell_bytes
            != PAGE_SIZE - page.available_space()
        {
            return Err(corrupt(page_id, "free space does not add up"));
        }

        if page.is_leaf() {
            if page.cell_count() == 0 && !page.is_root() {
                return Err(corrupt(page_id, "non-root leaf holds no cells"));
            }
            stats.leaf_count += 1;
            stats.leaf_cell_count += page.cell_count();
            in_order_leaves.push(page_id);
            match leaf_depth {
                None => leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(corrupt(
                        page_id,
                        format!("leaf at depth {} but others at {}", depth, expected),
                    ));
                }
                Some(_) => {}
            }
        } else {
            stats.interior_count += 1;
            if page.right_pointer().is_none() {
                return Err(corrupt(page_id, "interior page without rightmost child"));
            }
            let children = page.children()?;
            for &child_id in &children {
                let child = pager.read_page(child_id)?;
                if child.parent() != Some(page_id) {
                    return Err(corrupt(
                        child_id,
                        format!("parent is {:?}, expected {}", child.parent(), page_id),
                    ));
                }
            }
            // Reverse so the leftmost child is visited first.
            for &child_id in children.iter().rev() {
                stack.push((child_id, depth + 1));
            }
        }
    }

    let mut chained = Vec::with_capacity(in_order_leaves.len());
    let mut next = in_order_leaves.first().copied();
    while let Some(page_id) = next {
        if chained.len() > in_order_leaves.len() {
            return Err(corrupt(page_id, "leaf sibling chain loops"));
        }
        chained.push(page_id);
        next = pager.read_page(page_id)?.right_pointer();
    }
    if chained != in_order_leaves {
        return Err(corrupt(root, "leaf sibling chain is out of order"));
    }

    stats.depth = leaf_depth.unwrap_or(1);
    stats.page_count = visited.len();
    Ok(stats)
}

/// Every page reachable from `root`, breadth-first, with derived siblings
pub(crate) fn summarize(pager: &mut Pager, root: PageId) -> Result<Vec<PageSummary>, DatabaseError> {
    let mut summaries = Vec::new();
    let mut queue = VecDeque::from([(root, None::<Vec<PageId>>)]);
    while let Some((page_id, siblings)) = queue.pop_front() {
        let page = pager.read_page(page_id)?;
        let (left_sibling, right_sibling) = match &siblings {
            Some(group) => {
                let position = group.iter().position(|&id| id == page_id);
                (
                    position.and_then(|p| p.checked_sub(1)).map(|p| group[p]),
                    position.and_then(|p| group.get(p + 1).copied()),
                )
            }
            None => (None, None),
        };
        let keys = page
            .cells()
            .iter()
            .map(|bytes| Cell::decode(page.page_type, bytes).map(|cell| cell.key_label()))
            .collect::<Result<Vec<_>, _>>()?;
        let children = page.children()?;
        for &child in &children {
            queue.push_back((child, Some(children.clone())));
        }
        summaries.push(PageSummary {
            page_id,
            page_type: page.page_type,
            parent: page.parent(),
            left_sibling,
            right_sibling,
            right_pointer: page.right_pointer(),
            cell_count: page.cell_count(),
            available_space: page.available_space(),
            keys,
        });
    }
    Ok(summaries)
}
