use std::collections::HashSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::{
        schema::{TableData, TableSchema},
        types::Row,
    },
    storage::engine::Engine as StorageEngine,
};

use super::Engine;

/// Key prefix used when none is configured
pub const DEFAULT_NAMESPACE: &str = "pesadb_v1_";

/// Key-value store backed SQL engine
///
/// Each table is one blob under `namespace ++ Key::Table(name)`; the catalog
/// is a list of names under `namespace ++ Key::Catalog`, mirrored in memory.
pub struct KVEngine<E: StorageEngine> {
    kv: E,
    namespace: Vec<u8>,
    catalog: Vec<String>,
    names: HashSet<String>,
}

impl<E: StorageEngine> KVEngine<E> {
    pub fn new(engine: E) -> Result<Self> {
        Self::with_namespace(engine, DEFAULT_NAMESPACE)
    }

    /// Opens the engine under a key prefix, loading the catalog stored there
    pub fn with_namespace(mut engine: E, namespace: &str) -> Result<Self> {
        let namespace = namespace.as_bytes().to_vec();
        let catalog: Vec<String> = match engine.get(encode_key(&namespace, &Key::Catalog)?)? {
            Some(v) => bincode::deserialize(&v)
                .map_err(|e| Error::Internal(format!("catalog is unreadable: {}", e)))?,
            None => Vec::new(),
        };
        debug!("loaded catalog with {} tables", catalog.len());
        let names = catalog.iter().cloned().collect();
        Ok(Self {
            kv: engine,
            namespace,
            catalog,
            names,
        })
    }

    /// Returns the underlying storage engine
    pub fn into_inner(self) -> E {
        self.kv
    }

    fn key(&self, key: &Key) -> Result<Vec<u8>> {
        encode_key(&self.namespace, key)
    }

    /// Persists a candidate catalog; callers adopt it in memory only on success
    fn write_catalog(&mut self, catalog: &[String]) -> Result<()> {
        let key = self.key(&Key::Catalog)?;
        let value = bincode::serialize(catalog)?;
        self.kv.set(key, value)
    }
}

impl<E: StorageEngine> Engine for KVEngine<E> {
    fn save_table(&mut self, name: &str, schema: &TableSchema, records: &[Row]) -> Result<()> {
        let key = self.key(&Key::Table(name.to_string()))?;
        let value = bincode::serialize(&TableRef { schema, records })?;
        debug!("saving table {} ({} records, {} bytes)", name, records.len(), value.len());
        self.kv.set(key.clone(), value)?;

        if !self.names.contains(name) {
            let mut catalog = self.catalog.clone();
            catalog.push(name.to_string());
            if let Err(err) = self.write_catalog(&catalog) {
                // An uncataloged blob is unreachable; removing it is best effort
                if let Err(e) = self.kv.delete(key) {
                    warn!("leaving orphaned blob for table {}: {}", name, e);
                }
                return Err(err);
            }
            self.catalog = catalog;
            self.names.insert(name.to_string());
        }
        Ok(())
    }

    fn load_table(&mut self, name: &str) -> Result<Option<TableData>> {
        // Orphaned blobs left by a failed write stay invisible
        if !self.names.contains(name) {
            return Ok(None);
        }
        let key = self.key(&Key::Table(name.to_string()))?;
        self.kv
            .get(key)?
            .map(|v| {
                bincode::deserialize(&v)
                    .map_err(|e| Error::Internal(format!("table {} is unreadable: {}", name, e)))
            })
            .transpose()
    }

    fn delete_table(&mut self, name: &str) -> Result<()> {
        // Uncatalog first: once the name is gone the blob is unreachable
        if self.names.contains(name) {
            let catalog: Vec<String> = self.catalog.iter().filter(|n| *n != name).cloned().collect();
            self.write_catalog(&catalog)?;
            self.catalog = catalog;
            self.names.remove(name);
        }
        let key = self.key(&Key::Table(name.to_string()))?;
        self.kv.delete(key)?;
        debug!("deleted table {}", name);
        Ok(())
    }

    fn catalog(&self) -> Vec<String> {
        self.catalog.clone()
    }

    fn table_exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Drops the catalog key first, so a failure part way leaves either every
    /// table or none of them visible. Blobs that fail to delete stay behind
    /// unreachable until a table of the same name overwrites them.
    fn clear_all(&mut self) -> Result<()> {
        let key = self.key(&Key::Catalog)?;
        self.kv.delete(key)?;
        self.names.clear();

        let mut result = Ok(());
        for name in std::mem::take(&mut self.catalog) {
            let key = self.key(&Key::Table(name.clone()))?;
            if let Err(err) = self.kv.delete(key) {
                warn!("leaving orphaned blob for table {}: {}", name, err);
                result = result.and(Err(err));
            }
        }
        result
    }
}

/// Borrowed form of `TableData`, serialized identically
#[derive(Serialize)]
struct TableRef<'a> {
    schema: &'a TableSchema,
    records: &'a [Row],
}

/// Key types for KV storage operations
///
/// In bincode, enums are serialized as [variant_index][variant_data...],
/// so the two kinds never collide under one namespace.
#[derive(Debug, Serialize, Deserialize)]
enum Key {
    Catalog,
    Table(String),
}

fn encode_key(namespace: &[u8], key: &Key) -> Result<Vec<u8>> {
    let mut bytes = namespace.to_vec();
    bytes.extend(bincode::serialize(key)?);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::{KVEngine, Key, encode_key};
    use crate::{
        error::{Error, Result},
        sql::{
            engine::Engine,
            schema::{Column, TableSchema},
            types::{DataType, Value},
        },
        storage::{disk::DiskEngine, engine::Engine as StorageEngine, memory::MemoryEngine},
    };

    fn schema(name: &str) -> TableSchema {
        TableSchema::new(
            name.to_string(),
            vec![Column {
                name: "id".into(),
                datatype: DataType::Integer,
                primary_key: true,
                unique: false,
                nullable: true,
            }],
        )
    }

    /// Memory store that refuses writes to one chosen key
    #[derive(Default)]
    struct FailingEngine {
        inner: MemoryEngine,
        fail_on: Option<Vec<u8>>,
    }

    impl FailingEngine {
        fn check(&self, key: &[u8]) -> Result<()> {
            match &self.fail_on {
                Some(k) if k.as_slice() == key => Err(Error::Internal("write failed".into())),
                _ => Ok(()),
            }
        }
    }

    impl StorageEngine for FailingEngine {
        fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
            self.check(&key)?;
            self.inner.set(key, value)
        }

        fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn delete(&mut self, key: Vec<u8>) -> Result<()> {
            self.check(&key)?;
            self.inner.delete(key)
        }
    }

    fn catalog_key() -> Result<Vec<u8>> {
        encode_key(b"pesadb_v1_", &Key::Catalog)
    }

    fn table_key(name: &str) -> Result<Vec<u8>> {
        encode_key(b"pesadb_v1_", &Key::Table(name.into()))
    }

    #[test]
    fn test_failed_catalog_write() -> Result<()> {
        let mut kv = KVEngine::new(FailingEngine::default())?;
        kv.save_table("a", &schema("a"), &[])?;
        kv.kv.fail_on = Some(catalog_key()?);

        // a new table is neither cataloged nor left behind
        assert!(kv.save_table("b", &schema("b"), &[]).is_err());
        assert!(!kv.table_exists("b"));
        assert_eq!(kv.catalog(), vec!["a"]);
        assert_eq!(kv.load_table("b")?, None);
        assert_eq!(kv.kv.inner.get(table_key("b")?)?, None);

        // rewriting a cataloged table does not touch the catalog
        kv.save_table("a", &schema("a"), &[vec![Value::Integer(1)]])?;

        assert!(kv.delete_table("a").is_err());
        assert!(kv.table_exists("a"));
        assert_eq!(kv.must_load_table("a")?.records.len(), 1);

        assert!(kv.clear_all().is_err());
        assert_eq!(kv.catalog(), vec!["a"]);
        assert!(kv.must_load_table("a").is_ok());
        Ok(())
    }

    #[test]
    fn test_clear_all_with_failed_blob_delete() -> Result<()> {
        let mut kv = KVEngine::new(FailingEngine::default())?;
        for name in ["a", "b", "c"] {
            kv.save_table(name, &schema(name), &[])?;
        }
        kv.kv.fail_on = Some(table_key("b")?);

        // the tables are gone even though one blob stayed behind
        assert!(kv.clear_all().is_err());
        assert!(kv.catalog().is_empty());
        assert!(!kv.table_exists("a"));
        assert!(!kv.table_exists("b"));
        assert_eq!(kv.load_table("c")?, None);
        assert!(kv.kv.inner.get(table_key("b")?)?.is_some());
        assert_eq!(kv.load_table("b")?, None);

        // the leftover blob is replaced when the name is reused
        kv.kv.fail_on = None;
        kv.save_table("b", &schema("b"), &[vec![Value::Integer(9)]])?;
        assert_eq!(kv.catalog(), vec!["b"]);
        assert_eq!(kv.must_load_table("b")?.records, vec![vec![Value::Integer(9)]]);
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let mut kv = KVEngine::new(MemoryEngine::new())?;
        assert_eq!(kv.load_table("t")?, None);

        let records = vec![vec![Value::Integer(1)], vec![Value::Integer(2)]];
        kv.save_table("t", &schema("t"), &records)?;
        let table = kv.must_load_table("t")?;
        assert_eq!(table.schema, schema("t"));
        assert_eq!(table.records, records);

        // saving again replaces the blob without duplicating the catalog entry
        kv.save_table("t", &schema("t"), &[])?;
        assert!(kv.must_load_table("t")?.records.is_empty());
        assert_eq!(kv.catalog(), vec!["t"]);
        Ok(())
    }

    #[test]
    fn test_catalog() -> Result<()> {
        let mut kv = KVEngine::new(MemoryEngine::new())?;
        assert!(kv.catalog().is_empty());

        for name in ["a", "b", "c"] {
            kv.save_table(name, &schema(name), &[])?;
        }
        kv.delete_table("b")?;
        kv.delete_table("missing")?;
        assert_eq!(kv.catalog(), vec!["a", "c"]);
        assert!(kv.table_exists("a"));
        assert!(!kv.table_exists("b"));
        assert_eq!(kv.must_load_table("b"), Err(Error::TableNotFound("b".into())));

        kv.clear_all()?;
        assert!(kv.catalog().is_empty());
        assert_eq!(kv.load_table("a")?, None);
        // no blob or catalog key is left behind
        assert!(kv.into_inner().is_empty());
        Ok(())
    }

    #[test]
    fn test_catalog_is_authoritative() -> Result<()> {
        let mut kv = KVEngine::new(MemoryEngine::new())?;
        kv.save_table("t", &schema("t"), &[])?;

        // a cataloged table whose blob disappeared still exists but cannot be loaded
        let mut mem = kv.into_inner();
        mem.delete(encode_key(b"pesadb_v1_", &Key::Table("t".into()))?)?;
        let mut kv = KVEngine::new(mem)?;
        assert!(kv.table_exists("t"));
        assert!(matches!(kv.must_load_table("t"), Err(Error::Internal(_))));

        // an undecodable blob fails the read instead of panicking
        let mut mem = kv.into_inner();
        mem.set(encode_key(b"pesadb_v1_", &Key::Table("t".into()))?, vec![0xff; 3])?;
        let mut kv = KVEngine::new(mem)?;
        assert!(matches!(kv.load_table("t"), Err(Error::Internal(_))));
        Ok(())
    }

    #[test]
    fn test_namespaces() -> Result<()> {
        let mut kv = KVEngine::with_namespace(MemoryEngine::new(), "one_")?;
        kv.save_table("t", &schema("t"), &[])?;

        let kv = KVEngine::with_namespace(kv.into_inner(), "two_")?;
        assert!(kv.catalog().is_empty());

        let kv = KVEngine::with_namespace(kv.into_inner(), "one_")?;
        assert_eq!(kv.catalog(), vec!["t"]);
        // opening a namespace writes nothing until a table is saved
        assert_eq!(kv.into_inner().len(), 2);
        Ok(())
    }

    #[test]
    fn test_reopen_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pesadb.bin");

        let mut kv = KVEngine::new(DiskEngine::open(&path)?)?;
        kv.save_table("t", &schema("t"), &[vec![Value::Integer(7)]])?;
        drop(kv);

        let mut kv = KVEngine::new(DiskEngine::open(&path)?)?;
        assert_eq!(kv.catalog(), vec!["t"]);
        assert_eq!(kv.must_load_table("t")?.records, vec![vec![Value::Integer(7)]]);
        Ok(())
    }
}
