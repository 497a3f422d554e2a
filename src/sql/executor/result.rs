use std::time::Duration;

use serde::Serialize;

use crate::{
    error::Error,
    sql::{
        executor::ResultSet,
        types::{Row, Value},
    },
};

/// Uniform statement outcome handed to callers; never an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub success: bool,
    pub message: String,
    pub data: Option<Vec<Row>>,
    pub columns: Option<Vec<String>>,
    pub execution_time: Option<Duration>,
}

impl QueryResult {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
            data: None,
            columns: None,
            execution_time: None,
        }
    }

    fn rows(message: String, columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            data: Some(rows),
            columns: Some(columns),
            ..Self::ok(message)
        }
    }

    pub fn failure(err: Error) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: None,
            columns: None,
            execution_time: None,
        }
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = Some(elapsed);
        self
    }

    /// Looks up a cell by row position and column header
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let pos = self.columns.as_ref()?.iter().position(|c| c == column)?;
        self.data.as_ref()?.get(row)?.get(pos)
    }

    pub fn row_count(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

impl From<ResultSet> for QueryResult {
    fn from(rs: ResultSet) -> Self {
        match rs {
            ResultSet::ShowTables { tables } => Self::rows(
                format!("Found {} tables", tables.len()),
                vec!["table_name".to_string()],
                tables.into_iter().map(|t| vec![Value::String(t)]).collect(),
            ),
            ResultSet::CreateTable { table_name } => {
                Self::ok(format!("Table {} created successfully.", table_name))
            }
            ResultSet::DropTable { table_name } => Self::ok(format!("Table {} dropped.", table_name)),
            ResultSet::Insert { table_name, count } => Self::ok(format!(
                "{} row{} inserted into {}.",
                count,
                if count == 1 { "" } else { "s" },
                table_name
            )),
            ResultSet::Update { count } => Self::ok(format!("{} rows updated.", count)),
            ResultSet::Delete { count } => Self::ok(format!("{} rows deleted.", count)),
            ResultSet::Scan { columns, rows } => {
                Self::rows(format!("Selected {} rows.", rows.len()), columns, rows)
            }
            ResultSet::Describe { table_name, columns } => Self::rows(
                format!("Schema for {}", table_name),
                ["name", "type", "primaryKey", "unique", "nullable"]
                    .iter()
                    .map(|h| h.to_string())
                    .collect(),
                columns
                    .into_iter()
                    .map(|c| {
                        vec![
                            Value::String(c.name),
                            Value::String(c.datatype.to_string()),
                            Value::Boolean(c.primary_key),
                            Value::Boolean(c.unique),
                            Value::Boolean(c.nullable),
                        ]
                    })
                    .collect(),
            ),
        }
    }
}
