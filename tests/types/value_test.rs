use chrono::{NaiveDate, NaiveTime};
use proptest::prelude::*;
use slotdb::types::{
    MAX_TEXT_LENGTH,
    error::DatabaseError,
    value::{DataType, RESERVED_TYPE_CODE, TEXT_TYPE_CODE, Value},
};

fn decode_same(value: &Value) -> Result<Value, DatabaseError> {
    let code = value.type_code()?;
    Value::decode(code, &value.to_bytes()?)
}

#[test]
fn test_type_codes_and_sizes() -> Result<(), DatabaseError> {
    assert_eq!(Value::Null.type_code()?, 0);
    assert_eq!(Value::TinyInt(1).type_code()?, 1);
    assert_eq!(Value::BigInt(1).type_code()?, 4);
    assert_eq!(Value::Year(2024).type_code()?, 8);
    assert_eq!(Value::Text(String::new()).type_code()?, TEXT_TYPE_CODE);
    assert_eq!(Value::Text("abc".to_string()).type_code()?, TEXT_TYPE_CODE + 3);

    assert_eq!(DataType::encoded_size(3)?, 4);
    assert_eq!(DataType::encoded_size(10)?, 8);
    assert_eq!(DataType::encoded_size(TEXT_TYPE_CODE + 5)?, 5);
    assert_eq!(Value::Null.to_bytes()?.len(), 0);
    Ok(())
}

#[test]
fn test_reserved_code_is_rejected() {
    assert!(matches!(
        DataType::from_code(RESERVED_TYPE_CODE),
        Err(DatabaseError::InvalidTypeCode(7))
    ));
    assert!(Value::decode(RESERVED_TYPE_CODE, &[]).is_err());
}

#[test]
fn test_tinyint_is_signed() -> Result<(), DatabaseError> {
    let value = Value::TinyInt(-5);
    assert_eq!(value.to_bytes()?, vec![0xFB]);
    assert_eq!(decode_same(&value)?, value);
    Ok(())
}

#[test]
fn test_year_is_stored_as_offset() -> Result<(), DatabaseError> {
    let value = Value::Year(2024);
    assert_eq!(value.to_bytes()?, vec![24]);
    assert_eq!(decode_same(&value)?, value);

    assert!(Value::Year(1999).to_bytes().is_err());
    assert!(Value::from_string("2256", DataType::Year).is_err());
    assert_eq!(Value::from_string("2255", DataType::Year)?, Value::Year(2255));
    Ok(())
}

#[test]
fn test_date_and_time_parsing() -> Result<(), DatabaseError> {
    let date = NaiveDate::from_ymd_opt(2023, 3, 14).ok_or(DatabaseError::InvalidData {
        details: "bad test date".to_string(),
    })?;
    assert_eq!(Value::from_string("03/14/2023", DataType::Date)?, Value::Date(date));
    assert_eq!(Value::from_string("2023-03-14", DataType::Date)?, Value::Date(date));

    let datetime = Value::from_string("03/14/2023 15:09:26", DataType::DateTime)?;
    assert_eq!(datetime.to_string(), "2023-03-14 15:09:26");
    assert_eq!(decode_same(&datetime)?, datetime);

    let time = Value::from_string("07:30PM", DataType::Time)?;
    let expected = NaiveTime::from_hms_opt(19, 30, 0).ok_or(DatabaseError::InvalidData {
        details: "bad test time".to_string(),
    })?;
    assert_eq!(time, Value::Time(expected));
    assert_eq!(decode_same(&time)?, time);

    assert!(Value::from_string("14/03/2023", DataType::Date).is_err());
    Ok(())
}

#[test]
fn test_empty_literal_is_null_except_for_text() -> Result<(), DatabaseError> {
    assert_eq!(Value::from_string("", DataType::Int)?, Value::Null);
    assert_eq!(Value::from_string("null", DataType::Double)?, Value::Null);
    assert_eq!(Value::from_string("", DataType::Text)?, Value::Text(String::new()));
    Ok(())
}

#[test]
fn test_text_limits() {
    let longest = "x".repeat(MAX_TEXT_LENGTH);
    assert!(Value::Text(longest.clone()).to_bytes().is_ok());

    let too_long = format!("{}y", longest);
    assert!(Value::Text(too_long).type_code().is_err());
    assert!(Value::Text("caf\u{e9}".to_string()).to_bytes().is_err());
}

#[test]
fn test_cast_rules() -> Result<(), DatabaseError> {
    assert_eq!(Value::Int(12).cast(DataType::TinyInt)?, Value::TinyInt(12));
    assert_eq!(Value::Int(7).cast(DataType::Double)?, Value::Double(7.0));
    assert_eq!(Value::Text("42".to_string()).cast(DataType::SmallInt)?, Value::SmallInt(42));
    assert_eq!(Value::Null.cast(DataType::Date)?, Value::Null);

    match Value::Int(300).cast(DataType::TinyInt) {
        Err(DatabaseError::TypeMismatch { expected, actual }) => {
            assert_eq!(expected, "TINYINT");
            assert_eq!(actual, "INT");
        }
        other => panic!("Expected TypeMismatch, got {:?}", other),
    }
    assert!(Value::Double(1.5).cast(DataType::Int).is_err());
    Ok(())
}

#[test]
fn test_ordering_across_numeric_types() {
    assert!(Value::TinyInt(3) < Value::BigInt(4));
    assert!(Value::Double(2.5) > Value::Int(2));
    assert!(Value::Null < Value::Int(i32::MIN));
    assert_eq!(Value::Text("a".to_string()).partial_cmp(&Value::Int(1)), None);
}

#[test]
fn test_type_names_parse() -> Result<(), DatabaseError> {
    assert_eq!(DataType::from_name("integer")?, DataType::Int);
    assert_eq!(DataType::from_name("VARCHAR(20)")?, DataType::Text);
    assert_eq!(DataType::from_name("long")?, DataType::BigInt);
    assert!(DataType::from_name("BLOB").is_err());
    Ok(())
}

fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i8>().prop_map(Value::TinyInt),
        any::<i16>().prop_map(Value::SmallInt),
        any::<i32>().prop_map(Value::Int),
        any::<i64>().prop_map(Value::BigInt),
        (-1.0e6f64..1.0e6).prop_map(Value::Double),
        (2000u16..=2255).prop_map(Value::Year),
        (0u32..86_400).prop_filter_map("valid time", |secs| {
            NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).map(Value::Time)
        }),
        "[ -~]{0,60}".prop_map(Value::Text),
    ]
}

proptest! {
    #[test]
    fn prop_values_decode_to_themselves(value in any_value()) {
        let decoded = decode_same(&value).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, value);
    }
}
