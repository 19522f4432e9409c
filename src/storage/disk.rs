use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::{KeyValue, Store, StoreError};

/// Durable base store: an in-memory map snapshotted to `data.json` in the
/// data directory. Saves go through a temp file and an atomic rename so a
/// crash never leaves a half-written snapshot behind.
pub struct DiskStore {
    data: DashMap<String, String>,
    data_file: PathBuf,
    // Serializes snapshot writes; independent from map access.
    save_lock: Mutex<()>,
}

impl DiskStore {
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;

        let store = Self {
            data: DashMap::new(),
            data_file: data_dir.join("data.json"),
            save_lock: Mutex::new(()),
        };
        store.load_from_disk()?;

        Ok(store)
    }

    fn load_from_disk(&self) -> Result<(), StoreError> {
        if !self.data_file.exists() {
            return Ok(());
        }

        let raw = fs::read_to_string(&self.data_file)?;
        let snapshot: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupt(format!("data.json: {}", e)))?;

        for (key, value) in snapshot {
            self.data.insert(key, value);
        }

        Ok(())
    }

    fn save_to_disk(&self) -> Result<(), StoreError> {
        let _guard = self.save_lock.lock();

        let snapshot: HashMap<String, String> = self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let raw = serde_json::to_string(&snapshot)
            .map_err(|e| StoreError::Corrupt(format!("serialize snapshot: {}", e)))?;

        let tmp_file = self.data_file.with_extension("json.tmp");
        fs::write(&tmp_file, raw)?;
        fs::rename(&tmp_file, &self.data_file)?;

        Ok(())
    }
}

impl Store for DiskStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), value.to_string());
        self.save_to_disk()
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.data
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.data
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound)?;

        if let Err(e) = self.save_to_disk() {
            tracing::error!("Failed to persist delete of {}: {}", key, e);
        }

        Ok(())
    }

    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError> {
        Ok(self
            .data
            .iter()
            .map(|entry| KeyValue {
                key: entry.key().clone(),
                value: entry.value().clone(),
            })
            .collect())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.save_to_disk()
    }
}
