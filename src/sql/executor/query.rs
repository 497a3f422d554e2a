use std::cmp::Ordering;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Engine,
        executor::{ResultSet, resolve_column},
        parser::ast::{OrderDirection, Predicate},
    },
};

use super::Executor;

/// Table scan executor (SELECT)
pub struct Scan {
    table_name: String,
}

impl Scan {
    pub fn new(table_name: String) -> Box<Self> {
        Box::new(Self { table_name })
    }
}

impl<E: Engine> Executor<E> for Scan {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        let table = engine.must_load_table(&self.table_name)?;
        Ok(ResultSet::Scan {
            columns: table.schema.column_names(),
            rows: table.records,
        })
    }
}

/// WHERE executor - keeps rows satisfying a single comparison
pub struct Filter<E: Engine> {
    source: Box<dyn Executor<E>>,
    table_name: String,
    predicate: Predicate,
}

impl<E: Engine> Filter<E> {
    pub fn new(source: Box<dyn Executor<E>>, table_name: String, predicate: Predicate) -> Box<Self> {
        Box::new(Self {
            source,
            table_name,
            predicate,
        })
    }
}

impl<E: Engine> Executor<E> for Filter<E> {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        match self.source.execute(engine)? {
            ResultSet::Scan { columns, rows } => {
                let Predicate {
                    column,
                    operator,
                    value,
                } = self.predicate;
                let i = resolve_column(&columns, &self.table_name, &column)?;
                let rows = rows
                    .into_iter()
                    .filter(|row| operator.evaluate(&row[i], &value))
                    .collect();
                Ok(ResultSet::Scan { columns, rows })
            }
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}

/// ORDER BY executor - sorts rows by a single column
pub struct Order<E: Engine> {
    source: Box<dyn Executor<E>>,
    table_name: String,
    column: String,
    direction: OrderDirection,
}

impl<E: Engine> Order<E> {
    pub fn new(
        source: Box<dyn Executor<E>>,
        table_name: String,
        column: String,
        direction: OrderDirection,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            table_name,
            column,
            direction,
        })
    }
}

impl<E: Engine> Executor<E> for Order<E> {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        match self.source.execute(engine)? {
            ResultSet::Scan { columns, mut rows } => {
                let i = resolve_column(&columns, &self.table_name, &self.column)?;
                let direction = self.direction;
                // Stable sort; NULL sorts lowest, incomparable types keep their order
                rows.sort_by(|a, b| {
                    let o = a[i].partial_cmp(&b[i]).unwrap_or(Ordering::Equal);
                    match direction {
                        OrderDirection::Asc => o,
                        OrderDirection::Desc => o.reverse(),
                    }
                });
                Ok(ResultSet::Scan { columns, rows })
            }
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}

/// Projection executor - selects and renames output columns
pub struct Projection<E: Engine> {
    source: Box<dyn Executor<E>>,
    table_name: String,
    exprs: Vec<(String, Option<String>)>,
}

impl<E: Engine> Projection<E> {
    pub fn new(
        source: Box<dyn Executor<E>>,
        table_name: String,
        exprs: Vec<(String, Option<String>)>,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            table_name,
            exprs,
        })
    }
}

impl<E: Engine> Executor<E> for Projection<E> {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        match self.source.execute(engine)? {
            // SELECT * on an empty result reports the main table's schema only
            ResultSet::Scan { columns, rows } if self.exprs.is_empty() && rows.is_empty() => {
                Ok(ResultSet::Scan {
                    columns: columns.into_iter().filter(|c| !c.contains('.')).collect(),
                    rows,
                })
            }
            ResultSet::Scan { columns, rows } if self.exprs.is_empty() => {
                Ok(ResultSet::Scan { columns, rows })
            }
            ResultSet::Scan { columns, rows } => {
                let mut selected = Vec::with_capacity(self.exprs.len());
                let mut new_cols = Vec::with_capacity(self.exprs.len());
                for (name, alias) in self.exprs {
                    selected.push(resolve_column(&columns, &self.table_name, &name)?);
                    new_cols.push(alias.unwrap_or(name));
                }

                let rows = rows
                    .into_iter()
                    .map(|row| selected.iter().map(|i| row[*i].clone()).collect())
                    .collect();
                Ok(ResultSet::Scan {
                    columns: new_cols,
                    rows,
                })
            }
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}
