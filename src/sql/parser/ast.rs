use std::collections::BTreeMap;

use crate::sql::types::{DataType, Value};

/// Parsed statement, discriminated by statement kind.
/// Built by the parser and consumed once by the planner.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// SHOW TABLES
    ShowTables,
    /// CREATE TABLE statement
    CreateTable {
        name: String,
        columns: Vec<Column>,
    },
    /// INSERT statement (None columns means schema order)
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    },
    /// SELECT statement
    Select {
        table_name: String,
        /// Projection with optional aliases; empty means `*`
        columns: Vec<(String, Option<String>)>,
        joins: Vec<Join>,
        where_clause: Option<Predicate>,
        order_by: Option<(String, OrderDirection)>,
    },
    /// UPDATE statement
    Update {
        table_name: String,
        columns: BTreeMap<String, Value>,
        where_clause: Option<Predicate>,
    },
    /// DELETE statement
    Delete {
        table_name: String,
        where_clause: Option<Predicate>,
    },
    /// DROP TABLE statement
    DropTable { name: String },
    /// DESCRIBE statement
    Describe { name: String },
}

/// JOIN clause: `[INNER|LEFT|RIGHT] JOIN table ON left = right`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    /// Column references as written, possibly qualified (`users.id`)
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

/// Sort direction (ascending or descending)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Column definition for CREATE TABLE statements
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    /// None when neither NULL nor NOT NULL was given
    pub nullable: Option<bool>,
    pub primary_key: bool,
    pub unique: bool,
}

/// WHERE clause: `column <op> literal`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
}

impl Operator {
    /// Compares a record value against the predicate literal.
    /// Range comparisons never hold when either side is NULL or the types are incomparable.
    pub fn evaluate(&self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            Operator::Equal => lhs.matches(rhs),
            Operator::NotEqual => !lhs.matches(rhs),
            Operator::GreaterThan if lhs.is_null() || rhs.is_null() => false,
            Operator::LessThan if lhs.is_null() || rhs.is_null() => false,
            Operator::GreaterThan => lhs > rhs,
            Operator::LessThan => lhs < rhs,
        }
    }
}
