use crate::{
    error::{Error, Result},
    sql::{
        engine::Engine,
        executor::resolve_column,
        types::Value,
    },
};

use super::{Executor, ResultSet};

/// Nested Loop Join executor - equi-joins the rows built so far with one more table.
///
/// Keys are compared with [`Value::matches`], the same equality WHERE uses, so
/// a NULL key joins with a NULL key on the other side.
pub struct NestedLoopJoin<E: Engine> {
    left: Box<dyn Executor<E>>,
    right: Box<dyn Executor<E>>,
    table_name: String,
    join_table: String,
    on: (String, String),
    outer: bool,
}

impl<E: Engine> NestedLoopJoin<E> {
    pub fn new(
        left: Box<dyn Executor<E>>,
        right: Box<dyn Executor<E>>,
        table_name: String,
        join_table: String,
        on: (String, String),
        outer: bool,
    ) -> Box<Self> {
        Box::new(Self {
            left,
            right,
            table_name,
            join_table,
            on,
            outer,
        })
    }
}

/// Splits the ON condition into (left reference, joined-table column).
/// The side qualified with the joined table's name belongs to it.
fn join_columns<'a>(on: &'a (String, String), join_table: &str) -> (&'a str, &'a str) {
    let (a, b) = (on.0.as_str(), on.1.as_str());
    let qualified = |r: &str| r.split_once('.').map(|(t, _)| t) == Some(join_table);
    let (left, right) = if !qualified(b) && qualified(a) { (b, a) } else { (a, b) };
    let right = right.split_once('.').map_or(right, |(_, c)| c);
    (left, right)
}

impl<E: Engine> Executor<E> for NestedLoopJoin<E> {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        let Self {
            left,
            right,
            table_name,
            join_table,
            on,
            outer,
        } = *self;

        let (lcols, lrows) = match left.execute(engine)? {
            ResultSet::Scan { columns, rows } => (columns, rows),
            _ => return Err(Error::Internal("Unexpected result set".into())),
        };
        let (rcols, rrows) = match right.execute(engine)? {
            ResultSet::Scan { columns, rows } => (columns, rows),
            _ => return Err(Error::Internal("Unexpected result set".into())),
        };

        let (left_ref, right_col) = join_columns(&on, &join_table);
        let li = resolve_column(&lcols, &table_name, left_ref)?;
        let ri = rcols
            .iter()
            .position(|c| c == right_col)
            .ok_or_else(|| Error::ColumnNotFound(format!("{}.{}", join_table, right_col)))?;

        // Joined columns are always qualified with their table name
        let mut new_cols = lcols;
        new_cols.extend(rcols.iter().map(|c| format!("{}.{}", join_table, c)));

        let mut new_rows = Vec::new();
        for lrow in lrows {
            let mut matched = false;
            for rrow in &rrows {
                if !lrow[li].matches(&rrow[ri]) {
                    continue;
                }
                let mut row = lrow.clone();
                row.extend(rrow.iter().cloned());
                new_rows.push(row);
                matched = true;
            }

            // Left rows without a partner are padded with NULLs
            if outer && !matched {
                let mut row = lrow;
                row.extend(std::iter::repeat_n(Value::Null, rcols.len()));
                new_rows.push(row);
            }
        }

        Ok(ResultSet::Scan {
            columns: new_cols,
            rows: new_rows,
        })
    }
}
