use sqlparser::{
    ast::{
        BinaryOperator, ColumnOption, Expr, ObjectName, ObjectType, SelectItem, SetExpr, Statement,
        TableConstraint, TableFactor, UnaryOperator, Value as SqlValue,
    },
    dialect::SQLiteDialect,
    keywords::Keyword,
    parser::{IsOptional, Parser},
    tokenizer::Token,
};

use crate::{
    executor::predicate::{ComparisonOp, Predicate},
    planner::{
        error::PlannerError,
        logical_plan::{
            ColumnDefinition, CreateIndexPlan, CreateTablePlan, DeletePlan, DropTablePlan,
            InsertPlan, LogicalPlan, SelectPlan,
        },
    },
    types::value::{DataType, Value},
};

pub struct SqlParser;

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_sql(&self, sql: &str) -> Result<LogicalPlan, PlannerError> {
        let sql = sql.trim().trim_end_matches(';').trim();
        let words: Vec<String> = sql
            .split_whitespace()
            .map(|word| word.to_ascii_uppercase())
            .collect();

        match words.first().map(String::as_str) {
            Some("SHOW") if words.len() == 2 && words[1] == "TABLES" => Ok(LogicalPlan::ShowTables),
            Some("INSERT") => self.parse_insert(sql),
            Some("DELETE") => self.parse_delete(sql),
            Some(_) => {
                let dialect = SQLiteDialect {};
                let statements = Parser::parse_sql(&dialect, sql)?;
                if statements.len() != 1 {
                    return Err(PlannerError::InvalidQuery(
                        "Expected exactly one statement".to_string(),
                    ));
                }
                self.to_plan(&statements[0])
            }
            None => Err(PlannerError::EmptyStatement),
        }
    }

    fn to_plan(&self, statement: &Statement) -> Result<LogicalPlan, PlannerError> {
        match statement {
            Statement::CreateTable(create) => {
                let table_name = object_name(&create.name);
                let mut columns = Vec::with_capacity(create.columns.len());
                for column in &create.columns {
                    let mut definition = ColumnDefinition {
                        name: column.name.value.to_ascii_lowercase(),
                        data_type: self.convert_data_type(&column.data_type.to_string())?,
                        nullable: true,
                        primary_key: false,
                        unique: false,
                    };
                    for option in &column.options {
                        match &option.option {
                            ColumnOption::NotNull => definition.nullable = false,
                            ColumnOption::Null => definition.nullable = true,
                            ColumnOption::Unique { is_primary, .. } => {
                                definition.unique = true;
                                if *is_primary {
                                    definition.primary_key = true;
                                    definition.nullable = false;
                                }
                            }
                            other => {
                                return Err(PlannerError::UnsupportedExpression(format!(
                                    "column option {}",
                                    other
                                )));
                            }
                        }
                    }
                    columns.push(definition);
                }

                for constraint in &create.constraints {
                    let (names, primary) = match constraint {
                        TableConstraint::PrimaryKey { columns: keyed, .. } => (keyed, true),
                        TableConstraint::Unique { columns: keyed, .. } => (keyed, false),
                        other => {
                            return Err(PlannerError::UnsupportedExpression(format!(
                                "table constraint {}",
                                other
                            )));
                        }
                    };
                    for name in names {
                        let column = columns
                            .iter_mut()
                            .find(|c| c.name.eq_ignore_ascii_case(&name.value))
                            .ok_or_else(|| PlannerError::UnknownConstraintColumn(name.value.clone()))?;
                        column.unique = true;
                        if primary {
                            column.primary_key = true;
                            column.nullable = false;
                        }
                    }
                }

                Ok(LogicalPlan::CreateTable(CreateTablePlan { table_name, columns }))
            }
            Statement::CreateIndex(index) => {
                if index.columns.len() != 1 {
                    return Err(PlannerError::UnsupportedStatement(
                        "indexes cover exactly one column".to_string(),
                    ));
                }
                Ok(LogicalPlan::CreateIndex(CreateIndexPlan {
                    index_name: index.name.as_ref().map(object_name),
                    table_name: object_name(&index.table_name),
                    column_name: column_name(&index.columns[0].expr)?,
                }))
            }
            Statement::Drop {
                object_type: ObjectType::Table,
                if_exists,
                names,
                ..
            } => match names.as_slice() {
                [name] => Ok(LogicalPlan::DropTable(DropTablePlan {
                    table_name: object_name(name),
                    if_exists: *if_exists,
                })),
                _ => Err(PlannerError::UnsupportedStatement(
                    "DROP TABLE takes exactly one table".to_string(),
                )),
            },
            Statement::Query(query) => {
                let SetExpr::Select(select) = query.body.as_ref() else {
                    return Err(PlannerError::UnsupportedStatement(
                        "only plain SELECT queries are supported".to_string(),
                    ));
                };
                let table_name = match select.from.as_slice() {
                    [from] if from.joins.is_empty() => match &from.relation {
                        TableFactor::Table { name, .. } => object_name(name),
                        other => {
                            return Err(PlannerError::UnsupportedExpression(format!("FROM {}", other)));
                        }
                    },
                    _ => {
                        return Err(PlannerError::InvalidQuery(
                            "SELECT needs exactly one table".to_string(),
                        ));
                    }
                };

                let mut projected = Vec::new();
                let mut wildcard = false;
                for item in &select.projection {
                    match item {
                        SelectItem::Wildcard(_) => wildcard = true,
                        SelectItem::UnnamedExpr(expr) => projected.push(column_name(expr)?),
                        other => {
                            return Err(PlannerError::UnsupportedExpression(other.to_string()));
                        }
                    }
                }
                if wildcard && !projected.is_empty() {
                    return Err(PlannerError::InvalidQuery(
                        "cannot mix * with column names".to_string(),
                    ));
                }

                Ok(LogicalPlan::Select(SelectPlan {
                    table_name,
                    projected_columns: if wildcard { None } else { Some(projected) },
                    predicate: select.selection.as_ref().map(predicate).transpose()?,
                }))
            }
            _ => Err(PlannerError::UnsupportedStatement(statement.to_string())),
        }
    }

    /// `INSERT INTO t [(cols)] VALUES (...)[, (...)]`
    fn parse_insert(&self, sql: &str) -> Result<LogicalPlan, PlannerError> {
        let dialect = SQLiteDialect {};
        let mut parser = Parser::new(&dialect).try_with_sql(sql)?;
        parser.expect_keyword(Keyword::INSERT)?;
        parser.expect_keyword(Keyword::INTO)?;
        let table_name = object_name(&parser.parse_object_name(false)?);
        let columns = parser.parse_parenthesized_column_list(IsOptional::Optional, false)?;
        parser.expect_keyword(Keyword::VALUES)?;

        let rows = parser.parse_comma_separated(|p| {
            p.expect_token(&Token::LParen)?;
            let exprs = p.parse_comma_separated(|inner| inner.parse_expr())?;
            p.expect_token(&Token::RParen)?;
            Ok(exprs)
        })?;
        expect_end(&mut parser)?;

        let values = rows
            .iter()
            .map(|exprs| exprs.iter().map(literal).collect::<Result<Vec<_>, _>>())
            .collect::<Result<Vec<_>, _>>()?;
        let columns = if columns.is_empty() {
            None
        } else {
            Some(columns.iter().map(|c| c.value.to_ascii_lowercase()).collect())
        };

        Ok(LogicalPlan::Insert(InsertPlan {
            table_name,
            columns,
            values,
        }))
    }

    /// `DELETE FROM t [WHERE col op literal]`
    fn parse_delete(&self, sql: &str) -> Result<LogicalPlan, PlannerError> {
        let dialect = SQLiteDialect {};
        let mut parser = Parser::new(&dialect).try_with_sql(sql)?;
        parser.expect_keyword(Keyword::DELETE)?;
        parser.expect_keyword(Keyword::FROM)?;
        let table_name = object_name(&parser.parse_object_name(false)?);
        let predicate = if parser.parse_keyword(Keyword::WHERE) {
            Some(predicate(&parser.parse_expr()?)?)
        } else {
            None
        };
        expect_end(&mut parser)?;
        Ok(LogicalPlan::Delete(DeletePlan {
            table_name,
            predicate,
        }))
    }

    fn convert_data_type(&self, sql_type: &str) -> Result<DataType, PlannerError> {
        DataType::from_name(sql_type).map_err(|_| PlannerError::UnsupportedDataType(sql_type.to_string()))
    }
}

fn expect_end(parser: &mut Parser<'_>) -> Result<(), PlannerError> {
    let _ = parser.consume_token(&Token::SemiColon);
    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(PlannerError::InvalidQuery(format!("unexpected '{}'", next.token)));
    }
    Ok(())
}

fn object_name(name: &ObjectName) -> String {
    name.to_string().trim_matches(|c| c == '"' || c == '`').to_ascii_lowercase()
}

fn column_name(expr: &Expr) -> Result<String, PlannerError> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.to_ascii_lowercase()),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|ident| ident.value.to_ascii_lowercase())
            .ok_or_else(|| PlannerError::InvalidQuery("empty column name".to_string())),
        other => Err(PlannerError::UnsupportedExpression(other.to_string())),
    }
}

/// Map a SQL literal to a value; numbers become INT, BIGINT or DOUBLE
/// and are cast to the column type later.
fn literal(expr: &Expr) -> Result<Value, PlannerError> {
    match expr {
        Expr::Value(SqlValue::Number(text, _)) => number(text),
        Expr::Value(SqlValue::SingleQuotedString(text))
        | Expr::Value(SqlValue::DoubleQuotedString(text)) => Ok(Value::Text(text.clone())),
        Expr::Value(SqlValue::Boolean(flag)) => Ok(Value::TinyInt(*flag as i8)),
        Expr::Value(SqlValue::Null) => Ok(Value::Null),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match expr.as_ref() {
            Expr::Value(SqlValue::Number(text, _)) => number(&format!("-{}", text)),
            other => Err(PlannerError::UnsupportedExpression(format!("-{}", other))),
        },
        Expr::Nested(inner) => literal(inner),
        other => Err(PlannerError::UnsupportedExpression(other.to_string())),
    }
}

fn number(text: &str) -> Result<Value, PlannerError> {
    if let Ok(integer) = text.parse::<i64>() {
        return Ok(match i32::try_from(integer) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::BigInt(integer),
        });
    }
    text.parse::<f64>()
        .map(Value::Double)
        .map_err(|_| PlannerError::InvalidQuery(format!("invalid number '{}'", text)))
}

fn comparison(op: &BinaryOperator) -> Option<ComparisonOp> {
    match op {
        BinaryOperator::Eq => Some(ComparisonOp::Equal),
        BinaryOperator::NotEq => Some(ComparisonOp::NotEqual),
        BinaryOperator::Lt => Some(ComparisonOp::LessThan),
        BinaryOperator::LtEq => Some(ComparisonOp::LessThanOrEqual),
        BinaryOperator::Gt => Some(ComparisonOp::GreaterThan),
        BinaryOperator::GtEq => Some(ComparisonOp::GreaterThanOrEqual),
        _ => None,
    }
}

/// `literal op column` reads as `column flipped(op) literal`
fn flipped(op: ComparisonOp) -> ComparisonOp {
    match op {
        ComparisonOp::LessThan => ComparisonOp::GreaterThan,
        ComparisonOp::LessThanOrEqual => ComparisonOp::GreaterThanOrEqual,
        ComparisonOp::GreaterThan => ComparisonOp::LessThan,
        ComparisonOp::GreaterThanOrEqual => ComparisonOp::LessThanOrEqual,
        other => other,
    }
}

fn predicate(expr: &Expr) -> Result<Predicate, PlannerError> {
    match expr {
        Expr::Nested(inner) => predicate(inner),
        Expr::BinaryOp { left, op, right } => {
            let op = comparison(op)
                .ok_or_else(|| PlannerError::UnsupportedExpression(format!("operator {}", op)))?;
            match (column_name(left), column_name(right)) {
                (Ok(column), Err(_)) => Ok(Predicate::new(column, op, literal(right)?)),
                (Err(_), Ok(column)) => Ok(Predicate::new(column, flipped(op), literal(left)?)),
                _ => Err(PlannerError::UnsupportedExpression(format!(
                    "WHERE must compare one column with a literal: {}",
                    expr
                ))),
            }
        }
        other => Err(PlannerError::UnsupportedExpression(other.to_string())),
    }
}
