use crate::{
    error::{Error, Result},
    sql::{
        parser::ast::{self, JoinType},
        plan::{Node, Plan},
        schema::{self, TableSchema},
    },
};

/// Query planner - converts AST into execution plan nodes
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self {}
    }

    /// Builds an execution plan from an AST statement
    pub fn build(&mut self, stmt: ast::Statement) -> Result<Plan> {
        Ok(Plan(self.build_statement(stmt)?))
    }

    pub fn build_statement(&self, stmt: ast::Statement) -> Result<Node> {
        Ok(match stmt {
            ast::Statement::ShowTables => Node::ShowTables,
            ast::Statement::CreateTable { name, columns } => Node::CreateTable {
                schema: TableSchema::new(
                    name,
                    columns
                        .into_iter()
                        .map(|c| schema::Column {
                            name: c.name,
                            datatype: c.datatype,
                            primary_key: c.primary_key,
                            unique: c.unique,
                            // columns are nullable unless declared NOT NULL
                            nullable: c.nullable.unwrap_or(true),
                        })
                        .collect(),
                ),
            },
            ast::Statement::Insert {
                table_name,
                columns,
                values,
            } => Node::Insert {
                table_name,
                columns,
                values,
            },
            ast::Statement::Select {
                table_name,
                columns,
                joins,
                where_clause,
                order_by,
            } => {
                // Fixed evaluation order: joins, filter, sort, projection
                let mut node = Node::Scan {
                    table_name: table_name.clone(),
                };

                for join in joins {
                    let outer = match join.join_type {
                        JoinType::Inner => false,
                        JoinType::Left => true,
                        JoinType::Right => return Err(Error::Unimplemented("RIGHT JOIN".into())),
                    };
                    node = Node::NestedLoopJoin {
                        left: Box::new(node),
                        right: Box::new(Node::Scan {
                            table_name: join.table.clone(),
                        }),
                        table_name: table_name.clone(),
                        join_table: join.table,
                        on: (join.left, join.right),
                        outer,
                    };
                }

                if let Some(predicate) = where_clause {
                    node = Node::Filter {
                        source: Box::new(node),
                        table_name: table_name.clone(),
                        predicate,
                    };
                }

                if let Some((column, direction)) = order_by {
                    node = Node::Order {
                        source: Box::new(node),
                        table_name: table_name.clone(),
                        column,
                        direction,
                    };
                }

                Node::Projection {
                    source: Box::new(node),
                    table_name,
                    exprs: columns,
                }
            }
            ast::Statement::Update {
                table_name,
                columns,
                where_clause,
            } => Node::Update {
                table_name,
                columns,
                predicate: where_clause,
            },
            ast::Statement::Delete {
                table_name,
                where_clause,
            } => Node::Delete {
                table_name,
                predicate: where_clause,
            },
            ast::Statement::DropTable { name } => Node::DropTable { table_name: name },
            ast::Statement::Describe { name } => Node::Describe { table_name: name },
        })
    }
}
