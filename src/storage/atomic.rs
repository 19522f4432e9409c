use std::sync::Arc;

use parking_lot::Mutex;

use super::{KeyValue, Store, StoreError};

/// Integer counter layer. All operations serialize on one coarse mutex; a
/// missing key counts from zero, a non-integer value is an `InvalidType`
/// error.
pub struct AtomicStore {
    inner: Arc<dyn Store>,
    lock: Mutex<()>,
}

impl AtomicStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    pub fn increment(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let _guard = self.lock.lock();

        let current = match self.inner.get(key) {
            Ok(raw) => raw
                .parse::<i64>()
                .map_err(|_| StoreError::InvalidType(raw))?,
            Err(StoreError::NotFound) => 0,
            Err(e) => return Err(e),
        };

        let updated = current + delta;
        self.inner.set(key, &updated.to_string())?;

        Ok(updated)
    }

    pub fn decrement(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.increment(key, -delta)
    }

    /// Value-only compare-and-swap. An empty `expected` matches a missing
    /// key. Returns whether the swap happened.
    pub fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock.lock();

        let current = match self.inner.get(key) {
            Ok(value) => Some(value),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e),
        };

        match current {
            None if expected.is_empty() => {
                self.inner.set(key, new_value)?;
                Ok(true)
            }
            None => Ok(false),
            Some(value) if value == expected => {
                self.inner.set(key, new_value)?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, StoreError> {
        let raw = self.inner.get(key)?;
        raw.parse::<i64>().map_err(|_| StoreError::InvalidType(raw))
    }
}

impl Store for AtomicStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key)
    }

    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError> {
        self.inner.list_all()
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}
