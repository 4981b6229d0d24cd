use proptest::prelude::*;
use slotdb::types::{
    MAX_CELL_SIZE,
    error::DatabaseError,
    row::{Row, TABLE_LEAF_HEADER_SIZE},
    value::{DataType, Value},
};

fn sample_schema() -> Vec<DataType> {
    vec![DataType::Int, DataType::Text, DataType::Double, DataType::TinyInt]
}

#[test]
fn test_leaf_cell_layout() -> Result<(), DatabaseError> {
    let row = Row::with_row_id(
        9,
        vec![
            Value::Int(42),
            Value::Text("Alice".to_string()),
            Value::Double(1.5),
            Value::Null,
        ],
    );
    let cell = row.to_leaf_cell(&sample_schema())?;

    // header(6) + column count(1) + tags(4) + 4 + 5 + 8 + 0
    assert_eq!(cell.len(), TABLE_LEAF_HEADER_SIZE + 1 + 4 + 17);
    assert_eq!(i16::from_ne_bytes([cell[0], cell[1]]) as usize, cell.len() - TABLE_LEAF_HEADER_SIZE);
    assert_eq!(Row::leaf_cell_row_id(&cell)?, 9);
    assert_eq!(cell[TABLE_LEAF_HEADER_SIZE], 4);
    // NULL keeps its own tag rather than the column's
    assert_eq!(&cell[7..11], &[3, 12 + 5, 6, 0]);

    assert_eq!(Row::from_leaf_cell(&cell)?, row);
    Ok(())
}

#[test]
fn test_row_without_row_id_is_rejected() {
    let row = Row::new(vec![Value::Int(1), Value::Text("a".to_string()), Value::Null, Value::Null]);
    assert!(row.to_leaf_cell(&sample_schema()).is_err());
}

#[test]
fn test_type_mismatch_on_encode() {
    let row = Row::with_row_id(
        1,
        vec![
            Value::Text("oops".to_string()),
            Value::Text("a".to_string()),
            Value::Null,
            Value::Null,
        ],
    );
    match row.to_leaf_cell(&sample_schema()) {
        Err(DatabaseError::TypeMismatch { expected, actual }) => {
            assert_eq!(expected, "INT");
            assert_eq!(actual, "TEXT");
        }
        other => panic!("Expected TypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_arity_mismatch_on_encode() {
    let row = Row::with_row_id(1, vec![Value::Int(1)]);
    assert!(matches!(
        row.to_leaf_cell(&sample_schema()),
        Err(DatabaseError::SchemaViolation { .. })
    ));
}

#[test]
fn test_truncated_cell_fails_to_decode() -> Result<(), DatabaseError> {
    let row = Row::with_row_id(3, vec![Value::Int(1), Value::Text("abc".to_string()), Value::Null, Value::TinyInt(-1)]);
    let cell = row.to_leaf_cell(&sample_schema())?;
    assert!(Row::from_leaf_cell(&cell[..cell.len() - 1]).is_err());
    assert!(Row::from_leaf_cell(&cell[..3]).is_err());
    Ok(())
}

#[test]
fn test_largest_text_row_fits_a_cell() -> Result<(), DatabaseError> {
    let text = "t".repeat(MAX_CELL_SIZE - TABLE_LEAF_HEADER_SIZE - 2 - 4 - 1);
    let row = Row::with_row_id(1, vec![Value::Text(text), Value::Null]);
    let cell = row.to_leaf_cell(&[DataType::Text, DataType::Int])?;
    assert!(cell.len() <= MAX_CELL_SIZE);
    Ok(())
}

proptest! {
    #[test]
    fn prop_rows_decode_to_themselves(
        row_id in 1i32..i32::MAX,
        id in any::<i32>(),
        name in proptest::option::of("[a-z]{0,40}"),
        score in proptest::option::of(-1.0e9f64..1.0e9),
        small in any::<i8>(),
    ) {
        let row = Row::with_row_id(
            row_id,
            vec![
                Value::Int(id),
                name.map_or(Value::Null, Value::Text),
                score.map_or(Value::Null, Value::Double),
                Value::TinyInt(small),
            ],
        );
        let cell = row.to_leaf_cell(&sample_schema()).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let decoded = Row::from_leaf_cell(&cell).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, row);
    }
}
