use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::types::{DataType, Row},
};

/// Table schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
    /// Index name -> column name. Recorded only; lookups never use it.
    pub indices: BTreeMap<String, String>,
    /// Largest integer primary key ever stored in this table
    pub sequence: i64,
}

impl TableSchema {
    pub fn new(name: String, columns: Vec<Column>) -> Self {
        Self {
            name,
            columns,
            indices: BTreeMap::new(),
            sequence: 0,
        }
    }

    /// Validates table schema
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table {} has no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column {} in table {}",
                    col.name, self.name
                )));
            }
        }

        if self.columns.iter().filter(|c| c.primary_key).count() > 1 {
            return Err(Error::InvalidSchema(format!(
                "multiple primary keys for table {}",
                self.name
            )));
        }

        Ok(())
    }

    /// Returns the position and definition of the primary key column, if any
    pub fn primary_key(&self) -> Option<(usize, &Column)> {
        self.columns.iter().enumerate().find(|(_, c)| c.primary_key)
    }

    /// Returns the column index for a given column name
    pub fn get_col_index(&self, col_name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == col_name)
            .ok_or(Error::ColumnNotFound(format!("{}.{}", self.name, col_name)))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Column schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub primary_key: bool,
    pub unique: bool,
    pub nullable: bool,
}

/// A table as persisted: one blob holding the schema and every record.
/// Records are aligned with `schema.columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub schema: TableSchema,
    pub records: Vec<Row>,
}
