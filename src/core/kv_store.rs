//! Durable key/value storage shared by the widget state and run-state flags.
//!
//! Values are stored as JSON so that strings, integers and booleans can sit
//! side by side in one flat namespace.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{PulseError, Result};

pub type Record = BTreeMap<String, Value>;

/// Flat key/value store with read-after-write consistency.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> Result<()>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn remove(&self, key: &str) -> Result<()>;

    /// Overwrite every key in `record` as a single atomic update.
    fn write_all(&self, record: &Record) -> Result<()>;

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }
}

/// In-memory store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Record {
        self.entries.lock().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn write_all(&self, record: &Record) -> Result<()> {
        let mut entries = self.entries.lock();
        for (key, value) in record {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// JSON file store.
///
/// The whole file is rewritten through a temp file and a rename, so readers in
/// other processes see either the previous or the next record, never a mix.
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Record>,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let cache = read_record(&path)?;

        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, picking up writes from other processes.
    pub fn reload(&self) -> Result<()> {
        let fresh = read_record(&self.path)?;
        *self.cache.lock() = fresh;
        Ok(())
    }

    fn persist(&self, record: &Record) -> Result<()> {
        let map: Map<String, Value> = record.clone().into_iter().collect();
        let data = serde_json::to_vec_pretty(&Value::Object(map))?;

        // Unique temp name per writer, in the target directory so the rename stays atomic
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Record),
    {
        // Lock held across the write so concurrent setters cannot interleave.
        // Start from the file so keys written by other processes survive.
        let mut cache = self.cache.lock();
        let mut next = read_record(&self.path).unwrap_or_else(|_| cache.clone());
        mutate(&mut next);
        self.persist(&next)?;
        *cache = next;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.cache.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.update(|record| {
            record.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|record| {
            record.remove(key);
        })
    }

    fn write_all(&self, record: &Record) -> Result<()> {
        self.update(|current| {
            for (key, value) in record {
                current.insert(key.clone(), value.clone());
            }
        })
    }
}

fn read_record(path: &Path) -> Result<Record> {
    if !path.exists() {
        return Ok(Record::new());
    }

    let data = fs::read(path)?;
    if data.is_empty() {
        return Ok(Record::new());
    }

    match serde_json::from_slice::<Value>(&data) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(_) => Err(PulseError::store(format!(
            "{} does not hold a JSON object",
            path.display()
        ))),
        Err(e) => {
            log::warn!("Discarding unreadable state file {}: {}", path.display(), e);
            Ok(Record::new())
        }
    }
}
