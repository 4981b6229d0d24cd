use std::{cmp::Ordering, fmt};

use crate::{
    storage::schema::TableSchema,
    types::{error::DatabaseError, row::Row, value::Value},
};

/// Comparison operators for predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOp {
    /// Whether `stored.cmp(literal) == ordering` satisfies the operator
    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::NotEqual => ordering != Ordering::Equal,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(ComparisonOp::Equal),
            "<>" | "!=" => Some(ComparisonOp::NotEqual),
            "<" => Some(ComparisonOp::LessThan),
            "<=" => Some(ComparisonOp::LessThanOrEqual),
            ">" => Some(ComparisonOp::GreaterThan),
            ">=" => Some(ComparisonOp::GreaterThanOrEqual),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single-column filter: `column_name op value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column_name: String,
    pub op: ComparisonOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(column_name: impl Into<String>, op: ComparisonOp, value: Value) -> Self {
        Self {
            column_name: column_name.into(),
            op,
            value,
        }
    }

    /// Create an equality predicate
    pub fn eq(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::Equal, value)
    }

    pub fn ne(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::NotEqual, value)
    }

    pub fn lt(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::LessThan, value)
    }

    pub fn le(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::LessThanOrEqual, value)
    }

    pub fn gt(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::GreaterThan, value)
    }

    pub fn ge(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::GreaterThanOrEqual, value)
    }

    /// Whether a stored value satisfies the predicate. NULL never matches.
    pub fn matches_value(&self, stored: &Value) -> bool {
        if stored.is_null() || self.value.is_null() {
            return false;
        }
        stored
            .partial_cmp(&self.value)
            .is_some_and(|ordering| self.op.matches(ordering))
    }

    /// Evaluate the predicate against a row using the table schema
    pub fn evaluate(&self, row: &Row, schema: &TableSchema) -> Result<bool, DatabaseError> {
        let column_index = schema
            .get_column_index(&self.column_name)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: self.column_name.clone(),
                table: schema.table_name.clone(),
            })?;
        let stored = row.get_value(column_index).ok_or_else(|| DatabaseError::SchemaViolation {
            details: format!(
                "row has {} values, column '{}' is at {}",
                row.len(),
                self.column_name,
                column_index
            ),
        })?;
        Ok(self.matches_value(stored))
    }

    /// Cast the literal to the column's type so comparisons are exact
    pub fn bind(&self, schema: &TableSchema) -> Result<Predicate, DatabaseError> {
        let column = schema
            .get_column(&self.column_name)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: self.column_name.clone(),
                table: schema.table_name.clone(),
            })?;
        Ok(Predicate {
            column_name: column.name.clone(),
            op: self.op,
            value: self.value.cast(column.data_type)?,
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column_name, self.op, self.value)
    }
}
