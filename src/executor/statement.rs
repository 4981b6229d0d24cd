use std::fmt;

use tracing::debug;

use crate::{
    executor::{
        create_table::TableSchemaBuilder,
        delete::{Deleter, TableDeleter},
        insert::{Inserter, TableInserter},
    },
    planner::{
        error::PlannerError,
        logical_plan::{InsertPlan, LogicalPlan, SelectPlan},
        parser::SqlParser,
    },
    storage::{
        schema::{ROWID_COLUMN, TableSchema},
        storage_manager::StorageManager,
    },
    types::{error::DatabaseError, row::Row, value::Value},
};

#[derive(Debug, thiserror::Error)]
pub enum StatementError {
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What a statement hands back to the user
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    RowsAffected(usize),
    Message(String),
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Rows { rows, .. } => rows.len(),
            QueryResult::RowsAffected(count) => *count,
            QueryResult::Message(_) => 0,
        }
    }
}

/// Parse and run one SQL statement
pub fn run_sql(storage: &mut StorageManager, sql: &str) -> Result<QueryResult, StatementError> {
    let plan = SqlParser::new().parse_sql(sql)?;
    Ok(execute(storage, plan)?)
}

pub fn execute(storage: &mut StorageManager, plan: LogicalPlan) -> Result<QueryResult, DatabaseError> {
    debug!(?plan, "executing plan");
    match plan {
        LogicalPlan::CreateTable(create) => {
            let mut builder = TableSchemaBuilder::new(&create.table_name);
            for column in create.columns {
                builder = builder.add_column_with_constraints(
                    column.name,
                    column.data_type,
                    column.nullable,
                    column.primary_key,
                    column.unique,
                );
            }
            let schema = storage.create_table_with_builder(builder)?;
            Ok(QueryResult::Message(format!("Table '{}' created", schema.table_name)))
        }
        LogicalPlan::CreateIndex(index) => {
            storage.create_index(&index.table_name, &index.column_name)?;
            Ok(QueryResult::Message(format!(
                "Index on {}({}) created",
                index.table_name, index.column_name
            )))
        }
        LogicalPlan::DropTable(drop) => {
            if drop.if_exists && !storage.table_exists(&drop.table_name) {
                return Ok(QueryResult::Message(format!("Table '{}' does not exist", drop.table_name)));
            }
            storage.drop_table(&drop.table_name)?;
            Ok(QueryResult::Message(format!("Table '{}' dropped", drop.table_name)))
        }
        LogicalPlan::Insert(insert) => execute_insert(storage, insert),
        LogicalPlan::Select(select) => execute_select(storage, select),
        LogicalPlan::Delete(delete) => {
            let mut deleter = TableDeleter::new(storage, &delete.table_name)?;
            Ok(QueryResult::RowsAffected(deleter.delete_where(delete.predicate.as_ref())?))
        }
        LogicalPlan::ShowTables => Ok(QueryResult::Rows {
            columns: vec!["table_name".to_string()],
            rows: storage
                .table_names()?
                .into_iter()
                .map(|name| vec![Value::Text(name)])
                .collect(),
        }),
    }
}

/// Reorder values given for a column list into table order, NULL for the rest
fn arrange(schema: &TableSchema, columns: &[String], values: Vec<Value>) -> Result<Vec<Value>, DatabaseError> {
    if columns.len() != values.len() {
        return Err(DatabaseError::SchemaViolation {
            details: format!("{} columns but {} values", columns.len(), values.len()),
        });
    }
    let mut arranged = vec![Value::Null; schema.columns.len()];
    for (name, value) in columns.iter().zip(values) {
        let position = schema
            .get_column_index(name)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: name.clone(),
                table: schema.table_name.clone(),
            })?;
        arranged[position] = value;
    }
    Ok(arranged)
}

fn execute_insert(storage: &StorageManager, insert: InsertPlan) -> Result<QueryResult, DatabaseError> {
    let mut inserter = TableInserter::new(storage, &insert.table_name)?;
    let rows = match &insert.columns {
        Some(columns) => insert
            .values
            .into_iter()
            .map(|values| arrange(inserter.schema(), columns, values))
            .collect::<Result<Vec<_>, _>>()?,
        None => insert.values,
    };
    let row_ids = inserter.insert_batch(rows)?;
    Ok(QueryResult::RowsAffected(row_ids.len()))
}

fn execute_select(storage: &StorageManager, select: SelectPlan) -> Result<QueryResult, DatabaseError> {
    let schema = storage.get_table_schema(&select.table_name)?;
    let columns = select.projected_columns.unwrap_or_else(|| schema.column_names());

    // `None` selects the rowid itself
    let mut positions = Vec::with_capacity(columns.len());
    for name in &columns {
        if name.eq_ignore_ascii_case(ROWID_COLUMN) {
            positions.push(None);
            continue;
        }
        let position = schema
            .get_column_index(name)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: name.clone(),
                table: schema.table_name.clone(),
            })?;
        positions.push(Some(position));
    }

    let project = |row: Row| -> Vec<Value> {
        positions
            .iter()
            .map(|position| match position {
                Some(index) => row.get_value(*index).cloned().unwrap_or(Value::Null),
                None => row.row_id.map_or(Value::Null, Value::Int),
            })
            .collect()
    };
    let rows = storage
        .select(&schema.table_name, select.predicate)?
        .into_iter()
        .map(project)
        .collect();
    Ok(QueryResult::Rows { columns, rows })
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Message(message) => write!(f, "{}", message),
            QueryResult::RowsAffected(count) => {
                write!(f, "{} row{} affected", count, if *count == 1 { "" } else { "s" })
            }
            QueryResult::Rows { columns, rows } => {
                let cells: Vec<Vec<String>> = rows
                    .iter()
                    .map(|row| row.iter().map(Value::to_string).collect())
                    .collect();
                let mut widths: Vec<usize> = columns.iter().map(String::len).collect();
                for row in &cells {
                    for (width, cell) in widths.iter_mut().zip(row) {
                        *width = (*width).max(cell.len());
                    }
                }

                let border = widths
                    .iter()
                    .map(|width| "-".repeat(width + 2))
                    .collect::<Vec<_>>()
                    .join("+");
                let line = |values: &[String]| {
                    values
                        .iter()
                        .zip(&widths)
                        .map(|(value, width)| format!(" {:<width$} ", value, width = width))
                        .collect::<Vec<_>>()
                        .join("|")
                };

                writeln!(f, "+{}+", border)?;
                writeln!(f, "|{}|", line(columns))?;
                writeln!(f, "+{}+", border)?;
                for row in &cells {
                    writeln!(f, "|{}|", line(row))?;
                }
                writeln!(f, "+{}+", border)?;
                write!(f, "({} row{})", rows.len(), if rows.len() == 1 { "" } else { "s" })
            }
        }
    }
}
