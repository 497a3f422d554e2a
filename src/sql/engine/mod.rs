use std::time::Instant;

use log::{debug, info, warn};

use crate::{
    error::{Error, Result},
    sql::{
        executor::{self, QueryResult, ResultSet},
        parser::{Parser, ast::Statement},
        plan::Plan,
        schema::{TableData, TableSchema},
        types::{DataType, Row, Value},
    },
};

pub mod kv;

/// SQL engine trait (table-level persistence)
///
/// A table is stored as one unit: its schema together with every record.
/// The catalog of table names is authoritative for existence.
pub trait Engine {
    /// Writes the table's schema and records, then registers the name in the catalog
    fn save_table(&mut self, name: &str, schema: &TableSchema, records: &[Row]) -> Result<()>;
    /// Reads a table blob; None when nothing is stored under the name
    fn load_table(&mut self, name: &str) -> Result<Option<TableData>>;
    /// Removes the table blob and its catalog entry; a no-op for unknown tables
    fn delete_table(&mut self, name: &str) -> Result<()>;
    /// Table names in creation order
    fn catalog(&self) -> Vec<String>;
    fn table_exists(&self, name: &str) -> bool;
    /// Removes every table named in the catalog, then the catalog itself
    fn clear_all(&mut self) -> Result<()>;

    /// Returns table data, returns error if table doesn't exist
    fn must_load_table(&mut self, name: &str) -> Result<TableData> {
        if !self.table_exists(name) {
            return Err(Error::TableNotFound(name.to_string()));
        }
        self.load_table(name)?
            .ok_or(Error::Internal(format!("table {} is cataloged but has no data", name)))
    }

    fn session(self) -> Session<Self>
    where
        Self: Sized,
    {
        Session::new(self)
    }
}

/// SQL session: the single entry point chaining parser, key assignment and executor
pub struct Session<E: Engine> {
    engine: E,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

impl<E: Engine + 'static> Session<E> {
    /// Executes a SQL statement
    pub fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        let stmt = self.assign_primary_key(Parser::new(sql).parse()?)?;
        Plan::build(stmt)?.execute(&mut self.engine)
    }

    /// Executes a SQL statement, folding any failure into the returned result
    pub fn query(&mut self, sql: &str) -> QueryResult {
        debug!("executing: {}", sql);
        let start = Instant::now();
        let result = match Parser::new(sql)
            .parse()
            .and_then(|stmt| self.assign_primary_key(stmt))
        {
            Ok(stmt) => executor::execute(stmt, &mut self.engine),
            Err(err) => QueryResult::failure(err).with_execution_time(start.elapsed()),
        };
        if !result.success {
            warn!("statement failed: {}: {}", sql, result.message);
        }
        result
    }

    /// Seeds the demo tables when the catalog is empty. Returns whether anything was created.
    pub fn initialize_demo(&mut self) -> Result<bool> {
        if !self.engine.catalog().is_empty() {
            return Ok(false);
        }
        info!("initializing demo tables");
        for sql in [
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name STRING, email STRING UNIQUE)",
            "CREATE TABLE transactions (id INTEGER PRIMARY KEY, user_id INTEGER, amount DECIMAL, type STRING)",
            "INSERT INTO users (id, name, email) VALUES (1, 'Alice Maina', 'alice@pesapal.com')",
            "INSERT INTO users (id, name, email) VALUES (2, 'John Doe', 'john@pesapal.com')",
            "INSERT INTO transactions (id, user_id, amount, type) VALUES (101, 1, 2500.50, 'DEPOSIT')",
            "INSERT INTO transactions (id, user_id, amount, type) VALUES (102, 1, 50.00, 'PAYMENT')",
            "INSERT INTO transactions (id, user_id, amount, type) VALUES (103, 2, 1000.00, 'DEPOSIT')",
        ] {
            self.execute(sql)?;
        }
        Ok(true)
    }

    pub fn catalog(&self) -> Vec<String> {
        self.engine.catalog()
    }

    /// Drops every table
    pub fn reset(&mut self) -> Result<()> {
        info!("resetting all tables");
        self.engine.clear_all()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Fills in an integer primary key the INSERT leaves out or sets to NULL
    fn assign_primary_key(&mut self, stmt: Statement) -> Result<Statement> {
        match stmt {
            Statement::Insert {
                table_name,
                columns,
                values,
            } if self.engine.table_exists(&table_name) => {
                let table = self.engine.must_load_table(&table_name)?;
                let (columns, values) = with_primary_key(&table, columns, values);
                Ok(Statement::Insert {
                    table_name,
                    columns,
                    values,
                })
            }
            stmt => Ok(stmt),
        }
    }
}

/// Splices the next key value into an INSERT's columns and values.
///
/// An implicit column list one value short of the schema width binds to the
/// non-key columns, with the key prepended.
fn with_primary_key(
    table: &TableData,
    columns: Option<Vec<String>>,
    mut values: Vec<Value>,
) -> (Option<Vec<String>>, Vec<Value>) {
    let schema = &table.schema;
    let (pk_index, pk) = match schema.primary_key() {
        Some((i, col)) if col.datatype == DataType::Integer => (i, col),
        _ => return (columns, values),
    };

    let next = table
        .records
        .iter()
        .filter_map(|r| match r[pk_index] {
            Value::Integer(id) => Some(id),
            _ => None,
        })
        .max()
        .unwrap_or(0)
        .max(schema.sequence)
        .saturating_add(1);

    match columns {
        Some(mut columns) => match columns.iter().position(|c| *c == pk.name) {
            Some(i) => {
                if values.get(i).is_some_and(Value::is_null) {
                    values[i] = Value::Integer(next);
                }
                (Some(columns), values)
            }
            None => {
                columns.insert(0, pk.name.clone());
                values.insert(0, Value::Integer(next));
                (Some(columns), values)
            }
        },
        None if values.len() == schema.columns.len() => {
            if values[pk_index].is_null() {
                values[pk_index] = Value::Integer(next);
            }
            (None, values)
        }
        None if values.len() + 1 == schema.columns.len() => {
            let mut columns = vec![pk.name.clone()];
            columns.extend(
                schema
                    .columns
                    .iter()
                    .filter(|c| !c.primary_key)
                    .map(|c| c.name.clone()),
            );
            values.insert(0, Value::Integer(next));
            (Some(columns), values)
        }
        None => (None, values),
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, Session, kv::KVEngine};
    use crate::{
        error::{Error, Result},
        sql::{executor::ResultSet, types::Value},
        storage::memory::MemoryEngine,
    };

    fn session() -> Result<Session<KVEngine<MemoryEngine>>> {
        Ok(KVEngine::new(MemoryEngine::new())?.session())
    }

    fn ids(s: &mut Session<KVEngine<MemoryEngine>>, table: &str) -> Result<Vec<Value>> {
        Ok(s.engine_mut()
            .must_load_table(table)?
            .records
            .into_iter()
            .map(|r| r[0].clone())
            .collect())
    }

    #[test]
    fn test_assign_primary_key() -> Result<()> {
        let mut s = session()?;
        s.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name STRING)")?;

        s.execute("INSERT INTO t (name) VALUES ('a')")?;
        s.execute("INSERT INTO t (name) VALUES ('b')")?;
        s.execute("INSERT INTO t (id, name) VALUES (NULL, 'c')")?;
        s.execute("INSERT INTO t VALUES ('d')")?;
        s.execute("INSERT INTO t VALUES (NULL, 'e')")?;
        s.execute("INSERT INTO t (id, name) VALUES (40, 'f')")?;
        s.execute("INSERT INTO t (name) VALUES ('g')")?;
        assert_eq!(
            ids(&mut s, "t")?,
            [1, 2, 3, 4, 5, 40, 41].map(Value::Integer).to_vec()
        );
        Ok(())
    }

    #[test]
    fn test_sequence_survives_delete() -> Result<()> {
        let mut s = session()?;
        s.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name STRING)")?;
        s.execute("INSERT INTO t (name) VALUES ('a')")?;
        s.execute("INSERT INTO t (name) VALUES ('b')")?;
        s.execute("DELETE FROM t WHERE id = 2")?;
        s.execute("INSERT INTO t (name) VALUES ('c')")?;
        assert_eq!(ids(&mut s, "t")?, vec![Value::Integer(1), Value::Integer(3)]);

        s.execute("DELETE FROM t")?;
        s.execute("INSERT INTO t (name) VALUES ('d')")?;
        assert_eq!(ids(&mut s, "t")?, vec![Value::Integer(4)]);
        Ok(())
    }

    #[test]
    fn test_no_assignment_without_integer_key() -> Result<()> {
        let mut s = session()?;
        s.execute("CREATE TABLE plain (a INTEGER, b STRING)")?;
        s.execute("INSERT INTO plain (b) VALUES ('x')")?;
        assert_eq!(ids(&mut s, "plain")?, vec![Value::Null]);

        s.execute("CREATE TABLE codes (code STRING PRIMARY KEY, label STRING)")?;
        assert_eq!(
            s.execute("INSERT INTO codes (label) VALUES ('x')"),
            Err(Error::NotNullViolation("code".into()))
        );
        Ok(())
    }

    #[test]
    fn test_query_result() -> Result<()> {
        let mut s = session()?;
        let result = s.query("SELEC * FROM t");
        assert!(!result.success);
        assert!(result.message.starts_with("syntax error"));
        assert!(result.execution_time.is_some());

        let result = s.query("SELECT * FROM t");
        assert!(!result.success);
        assert_eq!(result.message, "table t not found");

        let result = s.query("CREATE TABLE t (id INTEGER PRIMARY KEY)");
        assert!(result.success);
        assert_eq!(result.message, "Table t created successfully.");
        Ok(())
    }

    #[test]
    fn test_initialize_demo() -> Result<()> {
        let mut s = session()?;
        assert!(s.initialize_demo()?);
        assert_eq!(s.catalog(), vec!["users", "transactions"]);
        // seeding is skipped once any table exists
        assert!(!s.initialize_demo()?);

        let ResultSet::Scan { rows, .. } = s.execute("SELECT * FROM transactions")? else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][2], Value::Float(2500.5));

        s.reset()?;
        assert!(s.catalog().is_empty());
        assert_eq!(
            s.execute("SELECT * FROM users"),
            Err(Error::TableNotFound("users".into()))
        );
        Ok(())
    }
}
