use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Engine,
        executor::{ResultSet, resolve_column},
        parser::ast::Predicate,
        schema::{TableData, TableSchema},
        types::{Row, Value},
    },
};

use super::Executor;

/// INSERT executor
pub struct Insert {
    table_name: String,
    columns: Option<Vec<String>>,
    values: Vec<Value>,
}

impl Insert {
    pub fn new(table_name: String, columns: Option<Vec<String>>, values: Vec<Value>) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            values,
        })
    }
}

// Assembles a full row in schema order.
// tbl: id name email
// insert into tbl (email, name) values ('a@b', 'A');
//    id       name    email
//   NULL       'A'    'a@b'
fn make_row(schema: &TableSchema, records: &[Row], columns: &[String], values: Vec<Value>) -> Result<Row> {
    if columns.len() != values.len() {
        return Err(Error::Internal(format!(
            "{} columns but {} values for table {}",
            columns.len(),
            values.len(),
            schema.name
        )));
    }

    let mut inputs = HashMap::new();
    for (col_name, value) in columns.iter().zip(values) {
        schema.get_col_index(col_name)?;
        inputs.insert(col_name.as_str(), value);
    }

    let mut row = Vec::with_capacity(schema.columns.len());
    for (i, col) in schema.columns.iter().enumerate() {
        let value = match inputs.remove(col.name.as_str()) {
            Some(value) => col.datatype.coerce(&col.name, value)?,
            None => Value::Null,
        };

        if value.is_null() {
            // integer primary keys have already been assigned by the session
            if !col.nullable || col.primary_key {
                return Err(Error::NotNullViolation(col.name.clone()));
            }
        } else if (col.primary_key || col.unique) && records.iter().any(|r| r[i].matches(&value)) {
            return Err(Error::UniqueViolation {
                column: col.name.clone(),
                value: value.to_string(),
            });
        }
        row.push(value);
    }

    Ok(row)
}

/// Fails if any two non-null values in the column are equal
fn check_unique(column: &str, index: usize, records: &[Row]) -> Result<()> {
    for (n, row) in records.iter().enumerate() {
        let value = &row[index];
        if value.is_null() {
            continue;
        }
        if records[..n].iter().any(|r| r[index].matches(value)) {
            return Err(Error::UniqueViolation {
                column: column.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Raises the table's key sequence to cover an integer primary key value
fn track_sequence(schema: &mut TableSchema, value: &Value) {
    if let Value::Integer(id) = value {
        schema.sequence = schema.sequence.max(*id);
    }
}

impl<E: Engine> Executor<E> for Insert {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        let TableData {
            mut schema,
            mut records,
        } = engine.must_load_table(&self.table_name)?;

        // Without a column list values bind positionally, trailing columns get NULL
        let columns = match self.columns {
            Some(columns) => columns,
            None if self.values.len() <= schema.columns.len() => schema
                .columns
                .iter()
                .take(self.values.len())
                .map(|c| c.name.clone())
                .collect(),
            None => {
                return Err(Error::Internal(format!(
                    "table {} has {} columns but {} values were given",
                    self.table_name,
                    schema.columns.len(),
                    self.values.len()
                )));
            }
        };

        let row = make_row(&schema, &records, &columns, self.values)?;
        if let Some((i, _)) = schema.primary_key() {
            track_sequence(&mut schema, &row[i]);
        }
        debug!("insert row into {}: {:?}", self.table_name, row);
        records.push(row);
        engine.save_table(&self.table_name, &schema, &records)?;

        Ok(ResultSet::Insert {
            table_name: self.table_name,
            count: 1,
        })
    }
}

/// UPDATE executor
pub struct Update {
    table_name: String,
    columns: BTreeMap<String, Value>,
    predicate: Option<Predicate>,
}

impl Update {
    pub fn new(
        table_name: String,
        columns: BTreeMap<String, Value>,
        predicate: Option<Predicate>,
    ) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            predicate,
        })
    }
}

impl<E: Engine> Executor<E> for Update {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        let TableData {
            mut schema,
            mut records,
        } = engine.must_load_table(&self.table_name)?;
        let names = schema.column_names();

        // Validate assignments before touching any record
        let mut updates = Vec::new();
        for (col_name, value) in self.columns {
            let index = resolve_column(&names, &self.table_name, &col_name)?;
            let col = &schema.columns[index];
            let value = col.datatype.coerce(&col.name, value)?;
            if value.is_null() && (!col.nullable || col.primary_key) {
                return Err(Error::NotNullViolation(col.name.clone()));
            }
            updates.push((index, value));
        }

        let filter = match &self.predicate {
            Some(p) => Some((resolve_column(&names, &self.table_name, &p.column)?, p)),
            None => None,
        };

        let mut count = 0;
        for row in records.iter_mut() {
            let matched = match filter {
                Some((i, p)) => p.operator.evaluate(&row[i], &p.value),
                None => true,
            };
            if matched {
                for (i, value) in &updates {
                    row[*i] = value.clone();
                }
                count += 1;
            }
        }

        // Constraints are checked on the rebuilt copy; nothing is persisted on failure
        for (i, value) in &updates {
            let col = &schema.columns[*i];
            if col.primary_key || col.unique {
                check_unique(&col.name, *i, &records)?;
            }
            if col.primary_key && count > 0 {
                track_sequence(&mut schema, value);
            }
        }

        engine.save_table(&self.table_name, &schema, &records)?;
        Ok(ResultSet::Update { count })
    }
}

/// DELETE executor
pub struct Delete {
    table_name: String,
    predicate: Option<Predicate>,
}

impl Delete {
    pub fn new(table_name: String, predicate: Option<Predicate>) -> Box<Self> {
        Box::new(Self {
            table_name,
            predicate,
        })
    }
}

impl<E: Engine> Executor<E> for Delete {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        let TableData {
            schema,
            mut records,
        } = engine.must_load_table(&self.table_name)?;
        let before = records.len();

        match &self.predicate {
            Some(p) => {
                let i = resolve_column(&schema.column_names(), &self.table_name, &p.column)?;
                records.retain(|row| !p.operator.evaluate(&row[i], &p.value));
            }
            None => records.clear(),
        }

        let count = before - records.len();
        engine.save_table(&self.table_name, &schema, &records)?;
        Ok(ResultSet::Delete { count })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::{Error, Result},
        sql::{
            engine::{Engine, Session, kv::KVEngine},
            executor::ResultSet,
            types::{DataType, Value},
        },
        storage::memory::MemoryEngine,
    };

    fn session() -> Result<Session<KVEngine<MemoryEngine>>> {
        let mut s = Session::new(KVEngine::new(MemoryEngine::new())?);
        s.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name STRING NOT NULL, email STRING UNIQUE, active BOOLEAN, balance DECIMAL)")?;
        Ok(s)
    }

    fn rows(s: &mut Session<KVEngine<MemoryEngine>>) -> Result<Vec<Vec<Value>>> {
        Ok(s.engine_mut().must_load_table("users")?.records)
    }

    #[test]
    fn test_insert() -> Result<()> {
        let mut s = session()?;
        assert_eq!(
            s.execute("INSERT INTO users (id, name, email, active, balance) VALUES (1, 'Alice', 'a@x.io', true, 10)")?,
            ResultSet::Insert {
                table_name: "users".into(),
                count: 1
            }
        );
        // omitted nullable columns are stored as NULL
        s.execute("INSERT INTO users (id, name) VALUES (2, 'Bob')")?;

        assert_eq!(
            rows(&mut s)?,
            vec![
                vec![
                    Value::Integer(1),
                    Value::String("Alice".into()),
                    Value::String("a@x.io".into()),
                    Value::Boolean(true),
                    Value::Float(10.0),
                ],
                vec![
                    Value::Integer(2),
                    Value::String("Bob".into()),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_insert_constraints() -> Result<()> {
        let mut s = session()?;
        s.execute("INSERT INTO users (id, name, email) VALUES (1, 'Alice', 'a@x.io')")?;

        assert_eq!(
            s.execute("INSERT INTO users (id, name) VALUES (1, 'Again')"),
            Err(Error::UniqueViolation {
                column: "id".into(),
                value: "1".into()
            })
        );
        assert_eq!(
            s.execute("INSERT INTO users (id, name, email) VALUES (2, 'Eve', 'a@x.io')"),
            Err(Error::UniqueViolation {
                column: "email".into(),
                value: "a@x.io".into()
            })
        );
        assert_eq!(
            s.execute("INSERT INTO users (id, email) VALUES (3, 'c@x.io')"),
            Err(Error::NotNullViolation("name".into()))
        );
        assert_eq!(
            s.execute("INSERT INTO users (id, name) VALUES (4, NULL)"),
            Err(Error::NotNullViolation("name".into()))
        );
        assert_eq!(
            s.execute("INSERT INTO users (id, name) VALUES ('five', 'Five')"),
            Err(Error::TypeMismatch {
                column: "id".into(),
                expected: DataType::Integer
            })
        );
        // unquoted digits bind as numbers, so a STRING column rejects them
        assert_eq!(
            s.execute("INSERT INTO users (id, name) VALUES (6, 123)"),
            Err(Error::TypeMismatch {
                column: "name".into(),
                expected: DataType::String
            })
        );
        assert_eq!(
            s.execute("INSERT INTO users (id, name, nickname) VALUES (7, 'x', 'y')"),
            Err(Error::ColumnNotFound("users.nickname".into()))
        );

        // failed inserts leave the table untouched
        assert_eq!(rows(&mut s)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_insert_positional() -> Result<()> {
        let mut s = session()?;
        s.execute("INSERT INTO users VALUES (1, 'Alice', 'a@x.io', false, 2.5)")?;
        // two values bind to the first two columns, the rest are NULL
        s.execute("INSERT INTO users VALUES (2, 'Bob')")?;
        assert!(s.execute("INSERT INTO users VALUES (3, 'C', 'c', true, 1.0, 'extra')").is_err());

        let records = rows(&mut s)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1][4], Value::Null);
        Ok(())
    }

    #[test]
    fn test_update() -> Result<()> {
        let mut s = session()?;
        s.execute("INSERT INTO users (id, name, email) VALUES (1, 'Alice', 'a@x.io')")?;
        s.execute("INSERT INTO users (id, name, email) VALUES (2, 'Bob', 'b@x.io')")?;
        s.execute("INSERT INTO users (id, name, email) VALUES (3, 'Carol', 'c@x.io')")?;

        assert_eq!(
            s.execute("UPDATE users SET name = 'B', active = true WHERE id = 2")?,
            ResultSet::Update { count: 1 }
        );
        assert_eq!(
            s.execute("UPDATE users SET balance = 5")?,
            ResultSet::Update { count: 3 }
        );
        assert_eq!(
            s.execute("UPDATE users SET name = 'none' WHERE id = 42")?,
            ResultSet::Update { count: 0 }
        );

        let records = rows(&mut s)?;
        assert_eq!(records[1][1], Value::String("B".into()));
        assert_eq!(records[1][3], Value::Boolean(true));
        assert!(records.iter().all(|r| r[4] == Value::Float(5.0)));
        Ok(())
    }

    #[test]
    fn test_update_validation() -> Result<()> {
        let mut s = session()?;
        s.execute("INSERT INTO users (id, name, email) VALUES (1, 'Alice', 'a@x.io')")?;
        s.execute("INSERT INTO users (id, name, email) VALUES (2, 'Bob', 'b@x.io')")?;
        let before = rows(&mut s)?;

        assert_eq!(
            s.execute("UPDATE users SET email = 'a@x.io' WHERE id = 2"),
            Err(Error::UniqueViolation {
                column: "email".into(),
                value: "a@x.io".into()
            })
        );
        assert_eq!(
            s.execute("UPDATE users SET id = 7"),
            Err(Error::UniqueViolation {
                column: "id".into(),
                value: "7".into()
            })
        );
        assert_eq!(
            s.execute("UPDATE users SET name = NULL"),
            Err(Error::NotNullViolation("name".into()))
        );
        assert!(matches!(
            s.execute("UPDATE users SET active = 'yes'"),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            s.execute("UPDATE users SET missing = 1"),
            Err(Error::ColumnNotFound(_))
        ));
        assert_eq!(
            s.execute("UPDATE ghosts SET a = 1"),
            Err(Error::TableNotFound("ghosts".into()))
        );

        assert_eq!(rows(&mut s)?, before);
        Ok(())
    }

    #[test]
    fn test_delete() -> Result<()> {
        let mut s = session()?;
        s.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')")?;
        s.execute("INSERT INTO users (id, name) VALUES (2, 'Bob')")?;
        s.execute("INSERT INTO users (id, name) VALUES (3, 'Carol')")?;

        assert_eq!(
            s.execute("DELETE FROM users WHERE name = 'Bob'")?,
            ResultSet::Delete { count: 1 }
        );
        assert_eq!(
            s.execute("DELETE FROM users WHERE id = 99")?,
            ResultSet::Delete { count: 0 }
        );
        assert_eq!(rows(&mut s)?.len(), 2);

        assert_eq!(s.execute("DELETE FROM users")?, ResultSet::Delete { count: 2 });
        assert!(rows(&mut s)?.is_empty());
        assert!(s.engine().table_exists("users"));
        Ok(())
    }
}
