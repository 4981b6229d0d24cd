use crate::{
    executor::predicate::Predicate,
    types::value::{DataType, Value},
};

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    CreateTable(CreateTablePlan),
    CreateIndex(CreateIndexPlan),
    DropTable(DropTablePlan),
    Insert(InsertPlan),
    Select(SelectPlan),
    Delete(DeletePlan),
    ShowTables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTablePlan {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexPlan {
    pub index_name: Option<String>,
    pub table_name: String,
    pub column_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTablePlan {
    pub table_name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub table_name: String,
    pub columns: Option<Vec<String>>,
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub table_name: String,
    /// `None` for `*`
    pub projected_columns: Option<Vec<String>>,
    pub predicate: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    pub table_name: String,
    pub predicate: Option<Predicate>,
}
