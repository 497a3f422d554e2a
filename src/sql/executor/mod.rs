use std::time::Instant;

use log::debug;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Engine,
        executor::{
            join::NestedLoopJoin,
            mutation::{Delete, Insert, Update},
            query::{Filter, Order, Projection, Scan},
            schema::{CreateTable, Describe, DropTable, ShowTables},
        },
        parser::ast::Statement,
        plan::{Node, Plan},
        schema::Column,
        types::Row,
    },
};

mod join;
mod mutation;
mod query;
mod result;
mod schema;

pub use result::QueryResult;

/// SQL executor trait
pub trait Executor<E: Engine> {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet>;
}

/// Builds an executor from a plan node
///
/// The `'static` bound is required for trait object usage in recursive executor building.
impl<E: Engine + 'static> dyn Executor<E> {
    pub fn build(node: Node) -> Box<dyn Executor<E>> {
        match node {
            Node::CreateTable { schema } => CreateTable::new(schema),
            Node::DropTable { table_name } => DropTable::new(table_name),
            Node::Describe { table_name } => Describe::new(table_name),
            Node::ShowTables => ShowTables::new(),
            Node::Insert {
                table_name,
                columns,
                values,
            } => Insert::new(table_name, columns, values),
            Node::Scan { table_name } => Scan::new(table_name),
            Node::NestedLoopJoin {
                left,
                right,
                table_name,
                join_table,
                on,
                outer,
            } => NestedLoopJoin::new(
                Self::build(*left),
                Self::build(*right),
                table_name,
                join_table,
                on,
                outer,
            ),
            Node::Filter {
                source,
                table_name,
                predicate,
            } => Filter::new(Self::build(*source), table_name, predicate),
            Node::Order {
                source,
                table_name,
                column,
                direction,
            } => Order::new(Self::build(*source), table_name, column, direction),
            Node::Projection {
                source,
                table_name,
                exprs,
            } => Projection::new(Self::build(*source), table_name, exprs),
            Node::Update {
                table_name,
                columns,
                predicate,
            } => Update::new(table_name, columns, predicate),
            Node::Delete {
                table_name,
                predicate,
            } => Delete::new(table_name, predicate),
        }
    }
}

/// Execution result set
#[derive(Debug, PartialEq)]
pub enum ResultSet {
    CreateTable { table_name: String },
    DropTable { table_name: String },
    Describe { table_name: String, columns: Vec<Column> },
    ShowTables { tables: Vec<String> },
    Insert { table_name: String, count: usize },
    Scan { columns: Vec<String>, rows: Vec<Row> },
    Update { count: usize },
    Delete { count: usize },
}

/// Plans and executes a statement, folding any failure into the result.
///
/// Elapsed time covers planning and execution and is attached to every result.
pub fn execute<E: Engine + 'static>(stmt: Statement, engine: &mut E) -> QueryResult {
    let start = Instant::now();
    let result = Plan::build(stmt).and_then(|plan| {
        debug!("executing plan {:?}", plan);
        plan.execute(engine)
    });
    let elapsed = start.elapsed();
    let result = match result {
        Ok(rs) => QueryResult::from(rs),
        Err(err) => QueryResult::failure(err),
    };
    result.with_execution_time(elapsed)
}

/// Resolves a column reference against a row layout.
///
/// Exact names win (`users.name` on a joined row); otherwise a qualifier equal
/// to the statement's main table is stripped, since main-table columns are
/// never qualified.
fn resolve_column(columns: &[String], table_name: &str, name: &str) -> Result<usize> {
    if let Some(pos) = columns.iter().position(|c| c == name) {
        return Ok(pos);
    }
    if let Some((qualifier, column)) = name.split_once('.') {
        if qualifier == table_name {
            if let Some(pos) = columns.iter().position(|c| c == column) {
                return Ok(pos);
            }
        }
    }
    Err(Error::ColumnNotFound(name.to_string()))
}
