//! File-backed key-value store adapter.
//!
//! Values are kept in a flat JSON object, by default at
//! `<data dir>/poslink/settings.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::sync::lock;
use crate::traits::KeyValueStore;

/// Durable string store persisted as JSON.
///
/// The whole map is cached in memory and rewritten on every `set_item`;
/// it only ever holds a handful of settings.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store; a corrupt one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cache = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::data_dir().ok_or(StoreError::NoDataDirectory)?;
        Self::open(dir.join("poslink").join("settings.json"))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.cache).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut cache = lock(&self.cache);
        let previous = cache.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&cache) {
            // Keep memory and disk in agreement.
            match previous {
                Some(old) => cache.insert(key.to_string(), old),
                None => cache.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}
