use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{error::Result, storage::engine::Engine};

/// File-backed storage engine
///
/// The whole key space is held in memory and the data file is rewritten on
/// every mutation: the snapshot goes to a temporary file in the same
/// directory, which is then renamed over the data file. A crash therefore
/// leaves either the old or the new snapshot, never a torn one.
pub struct DiskEngine {
    path: PathBuf,
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// On-disk representation of a single key/value pair
#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    value: Vec<u8>,
}

impl DiskEngine {
    /// Opens the data file at `path`, creating an empty store if it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => bincode::deserialize::<Vec<Entry>>(&bytes)?
                .into_iter()
                .map(|e| (e.key, e.value))
                .collect(),
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!("opened {} with {} keys", path.display(), data.len());
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current snapshot and atomically replaces the data file
    fn flush(&self) -> Result<()> {
        let entries = self
            .data
            .iter()
            .map(|(k, v)| Entry {
                key: k.clone(),
                value: v.clone(),
            })
            .collect::<Vec<_>>();
        let bytes = bincode::serialize(&entries)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(&self.path)?;
        Ok(())
    }
}

impl Engine for DiskEngine {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let previous = self.data.insert(key.clone(), value);
        if let Err(err) = self.flush() {
            // The map must keep matching the file
            match previous {
                Some(old) => self.data.insert(key, old),
                None => self.data.remove(&key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(&key).cloned())
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        if let Some(old) = self.data.remove(&key) {
            if let Err(err) = self.flush() {
                self.data.insert(key, old);
                return Err(err);
            }
        }
        Ok(())
    }
}
