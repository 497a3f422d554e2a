use std::collections::BTreeMap;

use crate::{
    error::Result,
    sql::{
        engine::Engine,
        executor::{Executor, ResultSet},
        parser::ast::{self, OrderDirection, Predicate},
        plan::planner::Planner,
        schema::TableSchema,
        types::Value,
    },
};

mod planner;

/// Execution plan node
#[derive(Debug, PartialEq)]
pub enum Node {
    CreateTable {
        schema: TableSchema,
    },
    DropTable {
        table_name: String,
    },
    Describe {
        table_name: String,
    },
    ShowTables,
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    },
    /// Full scan of a table's records
    Scan {
        table_name: String,
    },
    /// Nested-loop join of `left` (rooted at `table_name`) with `right` (the `join_table` scan)
    NestedLoopJoin {
        left: Box<Node>,
        right: Box<Node>,
        table_name: String,
        join_table: String,
        on: (String, String),
        outer: bool,
    },
    Filter {
        source: Box<Node>,
        table_name: String,
        predicate: Predicate,
    },
    Order {
        source: Box<Node>,
        table_name: String,
        column: String,
        direction: OrderDirection,
    },
    /// Column projection; an empty expression list keeps every column
    Projection {
        source: Box<Node>,
        table_name: String,
        exprs: Vec<(String, Option<String>)>,
    },
    Update {
        table_name: String,
        columns: BTreeMap<String, Value>,
        predicate: Option<Predicate>,
    },
    Delete {
        table_name: String,
        predicate: Option<Predicate>,
    },
}

/// Execution plan, built from a statement and consumed by a single execution
#[derive(Debug, PartialEq)]
pub struct Plan(pub Node);

impl Plan {
    /// Builds an execution plan from an AST statement
    pub fn build(stmt: ast::Statement) -> Result<Self> {
        Planner::new().build(stmt)
    }

    /// Executes the plan against a table engine
    pub fn execute<E: Engine + 'static>(self, engine: &mut E) -> Result<ResultSet> {
        <dyn Executor<E>>::build(self.0).execute(engine)
    }
}
