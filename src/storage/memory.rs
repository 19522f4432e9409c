use dashmap::DashMap;

use super::{KeyValue, Store, StoreError};

/// Volatile base store backed by a concurrent map.
pub struct MemoryStore {
    data: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
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
            .ok_or(StoreError::NotFound)
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
        Ok(())
    }
}
