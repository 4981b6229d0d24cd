use proptest::prelude::*;
use slotdb::{
    storage::bplus_tree::{ROOT_PAGE_ID, TableTree},
    types::{
        RowId,
        error::DatabaseError,
        page::PageType,
        value::{DataType, Value},
    },
    utils::mock::TempDatabase,
};

fn schema() -> Vec<DataType> {
    vec![DataType::Int, DataType::Text]
}

/// A row whose cell takes `6 + 1 + 2 + 4 + text_len` bytes
fn row(id: i32, text_len: usize) -> Vec<Value> {
    let text = format!("{:0>width$}", id, width = text_len);
    vec![Value::Int(id), Value::Text(text)]
}

fn fill(tree: &mut TableTree, count: i32, text_len: usize) -> Result<Vec<RowId>, DatabaseError> {
    (1..=count).map(|id| tree.insert(row(id, text_len), &schema())).collect()
}

fn scanned_ids(tree: &mut TableTree) -> Result<Vec<RowId>, DatabaseError> {
    Ok(tree.scan()?.into_iter().filter_map(|row| row.row_id).collect())
}

#[test]
fn test_new_tree_is_single_empty_leaf() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_new")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;

    assert_eq!(tree.root_page_id(), ROOT_PAGE_ID);
    assert_eq!(tree.page_count(), 1);
    assert_eq!(tree.next_row_id()?, 1);
    assert!(tree.scan()?.is_empty());
    assert_eq!(tree.validate()?.depth, 1);
    Ok(())
}

#[test]
fn test_row_ids_start_at_one_and_increase() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_rowids")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;

    let ids = fill(&mut tree, 5, 4)?;
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(tree.fetch(3)?.values, row(3, 4));
    assert!(tree.get(99)?.is_none());
    match tree.fetch(99) {
        Err(DatabaseError::KeyNotFound { .. }) => {}
        other => panic!("Expected KeyNotFound, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_leaf_split_creates_interior_root() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_split")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;

    // 53-byte cells: nine fit a leaf, the tenth splits the root
    fill(&mut tree, 10, 40)?;

    let root = tree.read_page(ROOT_PAGE_ID)?;
    assert_eq!(root.page_type, PageType::InteriorTable);
    assert_eq!(root.cell_count(), 1);

    let stats = tree.validate()?;
    assert_eq!(stats.depth, 2);
    assert_eq!(stats.leaf_count, 2);
    assert_eq!(stats.leaf_cell_count, 10);
    assert_eq!(scanned_ids(&mut tree)?, (1..=10).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_many_inserts_grow_to_three_levels() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_three_levels")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;

    // Two of these rows fill a leaf
    fill(&mut tree, 300, 200)?;

    let stats = tree.validate()?;
    assert_eq!(stats.depth, 3);
    assert_eq!(stats.leaf_cell_count, 300);
    assert_eq!(tree.read_page(ROOT_PAGE_ID)?.page_type, PageType::InteriorTable);
    assert_eq!(scanned_ids(&mut tree)?, (1..=300).collect::<Vec<_>>());
    for id in [1, 150, 299, 300] {
        assert_eq!(tree.fetch(id)?.values, row(id, 200));
    }
    Ok(())
}

#[test]
fn test_tree_survives_reopen() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_reopen")?;
    let path = temp_db.file("t.tbl");
    {
        let mut tree = TableTree::create(&path)?;
        fill(&mut tree, 40, 40)?;
    }
    let mut tree = TableTree::open(&path)?;
    assert_eq!(tree.next_row_id()?, 41);
    assert_eq!(scanned_ids(&mut tree)?.len(), 40);
    tree.validate()?;
    Ok(())
}

#[test]
fn test_oversized_row_is_rejected() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_too_large")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;

    // 6 + 1 + 3 + 4 + 4 + 240 = 258 bytes
    let values = vec![Value::Int(1), Value::Int(2), Value::Text("x".repeat(240))];
    match tree.insert(values, &[DataType::Int, DataType::Int, DataType::Text]) {
        Err(DatabaseError::RowTooLarge { size, max }) => {
            assert_eq!(size, 258);
            assert_eq!(max, 246);
        }
        other => panic!("Expected RowTooLarge, got {:?}", other),
    }
    assert!(tree.scan()?.is_empty());
    Ok(())
}

#[test]
fn test_delete_single_row() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_delete_one")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;
    fill(&mut tree, 50, 40)?;

    let removed = tree.delete(25)?;
    assert_eq!(removed.map(|row| row.values), Some(row(25, 40)));
    assert!(tree.get(25)?.is_none());
    assert!(tree.delete(25)?.is_none());

    let expected: Vec<RowId> = (1..=50).filter(|&id| id != 25).collect();
    assert_eq!(scanned_ids(&mut tree)?, expected);
    tree.validate()?;
    Ok(())
}

#[test]
fn test_delete_everything_collapses_to_empty_root() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_delete_all")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;
    fill(&mut tree, 120, 60)?;

    // Interleave the order so merges happen on both sides
    let mut order: Vec<RowId> = (1..=120).filter(|id| id % 2 == 0).collect();
    order.extend((1..=120).filter(|id| id % 2 == 1).rev());
    for (step, &row_id) in order.iter().enumerate() {
        assert!(tree.delete(row_id)?.is_some(), "row {} should exist", row_id);
        let stats = tree.validate()?;
        assert_eq!(stats.leaf_cell_count, order.len() - step - 1);
        assert_eq!(tree.root_page_id(), ROOT_PAGE_ID);
    }

    assert_eq!(tree.page_count(), 1);
    assert_eq!(tree.read_page(ROOT_PAGE_ID)?.page_type, PageType::LeafTable);
    assert_eq!(tree.next_row_id()?, 1);
    Ok(())
}

#[test]
fn test_deletes_rebalance_interior_levels() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_delete_deep")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;
    fill(&mut tree, 300, 200)?;
    assert_eq!(tree.validate()?.depth, 3);

    for row_id in 1..=280 {
        assert!(tree.delete(row_id)?.is_some());
        if row_id % 10 == 0 {
            let stats = tree.validate()?;
            assert_eq!(stats.leaf_cell_count, 300 - row_id as usize);
        }
    }

    tree.validate()?;
    assert_eq!(scanned_ids(&mut tree)?, (281..=300).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_delete_many_skips_missing_rows() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_delete_many")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;
    fill(&mut tree, 60, 40)?;

    let pages_before = tree.page_count();
    let targets: Vec<RowId> = (10..=40).chain([500, -3]).collect();
    let removed = tree.delete_many(&targets)?;
    assert_eq!(removed.len(), 31);

    let stats = tree.validate()?;
    assert_eq!(stats.leaf_cell_count, 29);
    assert!(tree.page_count() < pages_before);
    assert_eq!(stats.page_count as u32, tree.page_count());

    // Inserts continue after the largest remaining row id
    assert_eq!(tree.insert(row(61, 40), &schema())?, 61);
    tree.validate()?;
    Ok(())
}

#[test]
fn test_read_all_pages_reports_siblings() -> Result<(), DatabaseError> {
    let temp_db = TempDatabase::with_prefix("bplus_pages")?;
    let mut tree = TableTree::create(temp_db.file("t.tbl"))?;
    fill(&mut tree, 30, 40)?;

    let pages = tree.read_all_pages()?;
    assert_eq!(pages[0].page_id, ROOT_PAGE_ID);
    assert_eq!(pages[0].parent, None);

    let leaves: Vec<_> = pages.iter().filter(|p| p.page_type == PageType::LeafTable).collect();
    assert!(leaves.len() >= 3);
    assert_eq!(leaves[0].left_sibling, None);
    assert_eq!(leaves.last().and_then(|p| p.right_sibling), None);
    for pair in leaves.windows(2) {
        assert_eq!(pair[0].right_sibling, Some(pair[1].page_id));
        assert_eq!(pair[1].left_sibling, Some(pair[0].page_id));
        assert_eq!(pair[0].right_pointer, Some(pair[1].page_id));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_deletes_in_any_order_keep_tree_valid(
        order in Just((1..=80).collect::<Vec<RowId>>()).prop_shuffle()
    ) {
        let check = || -> Result<(), DatabaseError> {
            let temp_db = TempDatabase::with_prefix("bplus_prop")?;
            let mut tree = TableTree::create(temp_db.file("t.tbl"))?;
            fill(&mut tree, 80, 50)?;

            let mut remaining: Vec<RowId> = (1..=80).collect();
            for &row_id in &order {
                tree.delete(row_id)?;
                remaining.retain(|&id| id != row_id);
                tree.validate()?;
                if scanned_ids(&mut tree)? != remaining {
                    return Err(DatabaseError::InvalidData {
                        details: format!("scan disagrees after deleting {}", row_id),
                    });
                }
            }
            Ok(())
        };
        check().map_err(|e| TestCaseError::fail(e.to_string()))?;
    }
}
