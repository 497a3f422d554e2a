use crate::{
    error::{Error, Result},
    sql::{
        engine::Engine,
        executor::{Executor, ResultSet},
        schema::TableSchema,
    },
};

/// CREATE TABLE executor
pub struct CreateTable {
    schema: TableSchema,
}

impl CreateTable {
    pub fn new(schema: TableSchema) -> Box<Self> {
        Box::new(Self { schema })
    }
}

impl<E: Engine> Executor<E> for CreateTable {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        let table_name = self.schema.name.clone();
        if engine.table_exists(&table_name) {
            return Err(Error::DuplicateTable(table_name));
        }
        self.schema.validate()?;
        engine.save_table(&table_name, &self.schema, &[])?;
        Ok(ResultSet::CreateTable { table_name })
    }
}

/// DROP TABLE executor, succeeds whether or not the table existed
pub struct DropTable {
    table_name: String,
}

impl DropTable {
    pub fn new(table_name: String) -> Box<Self> {
        Box::new(Self { table_name })
    }
}

impl<E: Engine> Executor<E> for DropTable {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        engine.delete_table(&self.table_name)?;
        Ok(ResultSet::DropTable {
            table_name: self.table_name,
        })
    }
}

/// DESCRIBE executor
pub struct Describe {
    table_name: String,
}

impl Describe {
    pub fn new(table_name: String) -> Box<Self> {
        Box::new(Self { table_name })
    }
}

impl<E: Engine> Executor<E> for Describe {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        let table = engine.must_load_table(&self.table_name)?;
        Ok(ResultSet::Describe {
            table_name: self.table_name,
            columns: table.schema.columns,
        })
    }
}

/// SHOW TABLES executor
pub struct ShowTables;

impl ShowTables {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl<E: Engine> Executor<E> for ShowTables {
    fn execute(self: Box<Self>, engine: &mut E) -> Result<ResultSet> {
        Ok(ResultSet::ShowTables {
            tables: engine.catalog(),
        })
    }
}
