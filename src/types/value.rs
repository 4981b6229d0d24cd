use std::{cmp::Ordering, fmt};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::types::{MAX_TEXT_LENGTH, error::DatabaseError};

pub const TEXT_TYPE_CODE: u8 = 12;
pub const RESERVED_TYPE_CODE: u8 = 7;
pub const YEAR_BASE: i64 = 2000;
pub const YEAR_MAX: i64 = YEAR_BASE + u8::MAX as i64;

const MILLIS_PER_DAY: i64 = 86_400_000;

const DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%I:%M%p", "%H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Year,
    Time,
    DateTime,
    Date,
    Text,
}

impl DataType {
    /// Base type tag; TEXT tags add the string length
    pub fn type_code(&self) -> u8 {
        match self {
            DataType::Null => 0,
            DataType::TinyInt => 1,
            DataType::SmallInt => 2,
            DataType::Int => 3,
            DataType::BigInt => 4,
            DataType::Float => 5,
            DataType::Double => 6,
            DataType::Year => 8,
            DataType::Time => 9,
            DataType::DateTime => 10,
            DataType::Date => 11,
            DataType::Text => TEXT_TYPE_CODE,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, DatabaseError> {
        match code {
            0 => Ok(DataType::Null),
            1 => Ok(DataType::TinyInt),
            2 => Ok(DataType::SmallInt),
            3 => Ok(DataType::Int),
            4 => Ok(DataType::BigInt),
            5 => Ok(DataType::Float),
            6 => Ok(DataType::Double),
            8 => Ok(DataType::Year),
            9 => Ok(DataType::Time),
            10 => Ok(DataType::DateTime),
            11 => Ok(DataType::Date),
            TEXT_TYPE_CODE..=u8::MAX => Ok(DataType::Text),
            _ => Err(DatabaseError::InvalidTypeCode(code)),
        }
    }

    /// Number of value bytes that follow a type tag
    pub fn encoded_size(code: u8) -> Result<usize, DatabaseError> {
        let size = match DataType::from_code(code)? {
            DataType::Null => 0,
            DataType::TinyInt | DataType::Year => 1,
            DataType::SmallInt => 2,
            DataType::Int | DataType::Float | DataType::Time => 4,
            DataType::BigInt | DataType::Double | DataType::DateTime | DataType::Date => 8,
            DataType::Text => (code - TEXT_TYPE_CODE) as usize,
        };
        Ok(size)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::TinyInt => "TINYINT",
            DataType::SmallInt => "SMALLINT",
            DataType::Int => "INT",
            DataType::BigInt => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Year => "YEAR",
            DataType::Time => "TIME",
            DataType::DateTime => "DATETIME",
            DataType::Date => "DATE",
            DataType::Text => "TEXT",
        }
    }

    /// Parse a declared column type such as `INT`, `long` or `VARCHAR(20)`
    pub fn from_name(name: &str) -> Result<Self, DatabaseError> {
        let base = name.split('(').next().unwrap_or(name).trim().to_ascii_uppercase();
        match base.as_str() {
            "NULL" => Ok(DataType::Null),
            "TINYINT" => Ok(DataType::TinyInt),
            "SMALLINT" => Ok(DataType::SmallInt),
            "INT" | "INTEGER" => Ok(DataType::Int),
            "BIGINT" | "LONG" => Ok(DataType::BigInt),
            "FLOAT" | "REAL" => Ok(DataType::Float),
            "DOUBLE" => Ok(DataType::Double),
            "YEAR" => Ok(DataType::Year),
            "TIME" => Ok(DataType::Time),
            "DATETIME" => Ok(DataType::DateTime),
            "DATE" => Ok(DataType::Date),
            "TEXT" | "VARCHAR" | "CHAR" => Ok(DataType::Text),
            _ => Err(DatabaseError::InvalidData {
                details: format!("unsupported data type '{}'", name),
            }),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Year(u16),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::TinyInt(_) => DataType::TinyInt,
            Value::SmallInt(_) => DataType::SmallInt,
            Value::Int(_) => DataType::Int,
            Value::BigInt(_) => DataType::BigInt,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Year(_) => DataType::Year,
            Value::Time(_) => DataType::Time,
            Value::DateTime(_) => DataType::DateTime,
            Value::Date(_) => DataType::Date,
            Value::Text(_) => DataType::Text,
        }
    }

    /// Type tag written in front of the encoded value
    pub fn type_code(&self) -> Result<u8, DatabaseError> {
        match self {
            Value::Text(s) => {
                check_text(s)?;
                Ok(TEXT_TYPE_CODE + s.len() as u8)
            }
            other => Ok(other.data_type().type_code()),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::TinyInt(_) | Value::Year(_) => 1,
            Value::SmallInt(_) => 2,
            Value::Int(_) | Value::Float(_) | Value::Time(_) => 4,
            Value::BigInt(_) | Value::Double(_) | Value::DateTime(_) | Value::Date(_) => 8,
            Value::Text(s) => s.len(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            Value::Year(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Append the value's bytes (native byte order) to `buf`
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), DatabaseError> {
        match self {
            Value::Null => {}
            Value::TinyInt(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Value::SmallInt(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Value::Int(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Value::BigInt(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Value::Float(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Value::Double(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Value::Year(year) => {
                let offset = (*year as i64) - YEAR_BASE;
                if !(0..=u8::MAX as i64).contains(&offset) {
                    return Err(DatabaseError::InvalidData {
                        details: format!("year {} outside {}..={}", year, YEAR_BASE, YEAR_MAX),
                    });
                }
                buf.push(offset as u8);
            }
            Value::Time(time) => {
                let millis = time.num_seconds_from_midnight() as i32 * 1000
                    + (time.nanosecond() / 1_000_000).min(999) as i32;
                buf.extend_from_slice(&millis.to_ne_bytes());
            }
            Value::DateTime(datetime) => {
                let millis = datetime.and_utc().timestamp_millis();
                buf.extend_from_slice(&millis.to_ne_bytes());
            }
            Value::Date(date) => {
                let millis = date.and_time(NaiveTime::default()).and_utc().timestamp_millis();
                buf.extend_from_slice(&millis.to_ne_bytes());
            }
            Value::Text(s) => {
                check_text(s)?;
                buf.extend_from_slice(s.as_bytes());
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DatabaseError> {
        let mut buf = Vec::with_capacity(self.size());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode the bytes that follow type tag `code`
    pub fn decode(code: u8, bytes: &[u8]) -> Result<Value, DatabaseError> {
        let expected = DataType::encoded_size(code)?;
        if bytes.len() != expected {
            return Err(DatabaseError::SerializationError {
                details: format!(
                    "type code {} needs {} bytes, got {}",
                    code,
                    expected,
                    bytes.len()
                ),
            });
        }
        let bad = |what: &str| DatabaseError::SerializationError {
            details: format!("invalid {} encoding", what),
        };
        let value = match DataType::from_code(code)? {
            DataType::Null => Value::Null,
            DataType::TinyInt => Value::TinyInt(i8::from_ne_bytes([bytes[0]])),
            DataType::SmallInt => Value::SmallInt(i16::from_ne_bytes(fixed(bytes)?)),
            DataType::Int => Value::Int(i32::from_ne_bytes(fixed(bytes)?)),
            DataType::BigInt => Value::BigInt(i64::from_ne_bytes(fixed(bytes)?)),
            DataType::Float => Value::Float(f32::from_ne_bytes(fixed(bytes)?)),
            DataType::Double => Value::Double(f64::from_ne_bytes(fixed(bytes)?)),
            DataType::Year => Value::Year((YEAR_BASE + bytes[0] as i64) as u16),
            DataType::Time => {
                let millis = i32::from_ne_bytes(fixed(bytes)?) as i64;
                if !(0..MILLIS_PER_DAY).contains(&millis) {
                    return Err(bad("TIME"));
                }
                let time = NaiveTime::from_num_seconds_from_midnight_opt(
                    (millis / 1000) as u32,
                    ((millis % 1000) * 1_000_000) as u32,
                )
                .ok_or_else(|| bad("TIME"))?;
                Value::Time(time)
            }
            DataType::DateTime => {
                let millis = i64::from_ne_bytes(fixed(bytes)?);
                let datetime = DateTime::from_timestamp_millis(millis).ok_or_else(|| bad("DATETIME"))?;
                Value::DateTime(datetime.naive_utc())
            }
            DataType::Date => {
                let millis = i64::from_ne_bytes(fixed(bytes)?);
                let datetime = DateTime::from_timestamp_millis(millis).ok_or_else(|| bad("DATE"))?;
                Value::Date(datetime.date_naive())
            }
            DataType::Text => {
                let text = std::str::from_utf8(bytes).map_err(|_| bad("TEXT"))?;
                Value::Text(text.to_string())
            }
        };
        Ok(value)
    }

    /// Map a literal typed by a user to a value of `data_type`
    pub fn from_string(text: &str, data_type: DataType) -> Result<Value, DatabaseError> {
        let trimmed = text.trim();
        if data_type != DataType::Text && (trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")) {
            return Ok(Value::Null);
        }
        let invalid = || DatabaseError::InvalidData {
            details: format!("'{}' is not a valid {}", text, data_type),
        };
        let value = match data_type {
            DataType::Null => Value::Null,
            DataType::TinyInt => Value::TinyInt(trimmed.parse().map_err(|_| invalid())?),
            DataType::SmallInt => Value::SmallInt(trimmed.parse().map_err(|_| invalid())?),
            DataType::Int => Value::Int(trimmed.parse().map_err(|_| invalid())?),
            DataType::BigInt => Value::BigInt(trimmed.parse().map_err(|_| invalid())?),
            DataType::Float => Value::Float(trimmed.parse().map_err(|_| invalid())?),
            DataType::Double => Value::Double(trimmed.parse().map_err(|_| invalid())?),
            DataType::Year => {
                let year: i64 = trimmed.parse().map_err(|_| invalid())?;
                if !(YEAR_BASE..=YEAR_MAX).contains(&year) {
                    return Err(invalid());
                }
                Value::Year(year as u16)
            }
            DataType::Time => TIME_FORMATS
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
                .map(Value::Time)
                .ok_or_else(invalid)?,
            DataType::DateTime => DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(Value::DateTime)
                .ok_or_else(invalid)?,
            DataType::Date => DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
                .map(Value::Date)
                .ok_or_else(invalid)?,
            DataType::Text => {
                check_text(text)?;
                Value::Text(text.to_string())
            }
        };
        Ok(value)
    }

    /// Convert to `target`, rejecting lossy or out-of-range conversions
    pub fn cast(&self, target: DataType) -> Result<Value, DatabaseError> {
        if self.is_null() || self.data_type() == target {
            return Ok(self.clone());
        }
        if let Value::Text(s) = self {
            return Value::from_string(s, target);
        }
        let mismatch = || DatabaseError::TypeMismatch {
            expected: target.to_string(),
            actual: self.data_type().to_string(),
        };
        let integer = self.as_i64();
        let converted = match target {
            DataType::TinyInt => integer.and_then(|v| i8::try_from(v).ok()).map(Value::TinyInt),
            DataType::SmallInt => integer.and_then(|v| i16::try_from(v).ok()).map(Value::SmallInt),
            DataType::Int => integer.and_then(|v| i32::try_from(v).ok()).map(Value::Int),
            DataType::BigInt => integer.map(Value::BigInt),
            DataType::Float => self.as_f64().map(|v| Value::Float(v as f32)),
            DataType::Double => self.as_f64().map(Value::Double),
            DataType::Year => integer
                .filter(|year| (YEAR_BASE..=YEAR_MAX).contains(year))
                .map(|year| Value::Year(year as u16)),
            DataType::DateTime => match self {
                Value::Date(date) => Some(Value::DateTime(date.and_time(NaiveTime::default()))),
                _ => None,
            },
            _ => None,
        };
        converted.ok_or_else(mismatch)
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], DatabaseError> {
    bytes.try_into().map_err(|_| DatabaseError::SerializationError {
        details: format!("expected {} bytes, got {}", N, bytes.len()),
    })
}

fn check_text(text: &str) -> Result<(), DatabaseError> {
    if !text.is_ascii() {
        return Err(DatabaseError::InvalidData {
            details: "TEXT values must be ASCII".to_string(),
        });
    }
    if text.len() > MAX_TEXT_LENGTH {
        return Err(DatabaseError::InvalidData {
            details: format!(
                "TEXT of {} characters exceeds {}",
                text.len(),
                MAX_TEXT_LENGTH
            ),
        });
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Year(v) => write!(f, "{}", v),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Time(a), Value::Time(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::DateTime(b)) => a.and_time(NaiveTime::default()).partial_cmp(b),
            (Value::DateTime(a), Value::Date(b)) => a.partial_cmp(&b.and_time(NaiveTime::default())),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None, // Mixed types
                },
            },
        }
    }
}
