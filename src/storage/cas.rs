use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::wal::now_nanos;
use super::{KeyValue, Store, StoreError};

/// Outcome of a compare-and-set. A failed precondition is data, not an
/// error: `success` is false and `current_value` carries what the key holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasResult {
    pub success: bool,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<String>,
}

/// Versioned compare-and-set plus advisory locks.
///
/// Every successful mutation through this layer stamps the key with a
/// nanosecond version. Lock values are stored in-band as
/// `locked:<expiry_nanos>`; a lock whose embedded expiry has passed is free
/// to reclaim.
pub struct CasStore {
    inner: Arc<dyn Store>,
    versions: DashMap<String, i64>,
    lock: Mutex<()>,
}

impl CasStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            versions: DashMap::new(),
            lock: Mutex::new(()),
        }
    }

    pub fn get_with_version(&self, key: &str) -> Result<(String, i64), StoreError> {
        let value = self.inner.get(key)?;
        let version = self.versions.get(key).map(|v| *v).unwrap_or(0);
        Ok((value, version))
    }

    /// Succeeds only when the current value equals `expected` and, unless
    /// `expected_version` is zero, the current version matches too. A
    /// missing key matches `expected == ""`.
    pub fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        new_value: &str,
        expected_version: i64,
    ) -> Result<CasResult, StoreError> {
        let _guard = self.lock.lock();

        let current = match self.inner.get(key) {
            Ok(value) => Some(value),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e),
        };
        let current_version = self.versions.get(key).map(|v| *v).unwrap_or(0);

        let value_matches = match &current {
            Some(value) => value == expected,
            None => expected.is_empty(),
        };
        let version_matches = expected_version == 0 || current_version == expected_version;

        if !value_matches || !version_matches {
            return Ok(CasResult {
                success: false,
                version: current_version,
                current_value: current,
            });
        }

        let new_version = now_nanos();
        self.inner.set(key, new_value)?;
        self.versions.insert(key.to_string(), new_version);

        Ok(CasResult {
            success: true,
            version: new_version,
            current_value: None,
        })
    }

    /// Tries to take the advisory lock at `key` for `ttl`. A held lock whose
    /// embedded expiry lies in the past is reclaimed with a second CAS from
    /// the stale value.
    pub fn acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let expiry = now_nanos() + ttl.as_nanos() as i64;
        let lock_value = format!("locked:{}", expiry);

        let result = self.compare_and_set(key, "", &lock_value, 0)?;
        if result.success {
            return Ok(true);
        }

        // Lock is held; reclaim it when the embedded expiry has passed.
        let current = match self.inner.get(key) {
            Ok(value) => value,
            Err(StoreError::NotFound) => {
                // Freed between the CAS and this read; retry from empty.
                return Ok(self.compare_and_set(key, "", &lock_value, 0)?.success);
            }
            Err(e) => return Err(e),
        };

        let stale = current
            .strip_prefix("locked:")
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|held_expiry| now_nanos() > held_expiry)
            .unwrap_or(false);

        if stale {
            return Ok(self.compare_and_set(key, &current, &lock_value, 0)?.success);
        }

        Ok(false)
    }

    pub fn release_lock(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();

        self.versions.remove(key);
        match self.inner.delete(key) {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Store for CasStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();

        self.inner.set(key, value)?;
        self.versions.insert(key.to_string(), now_nanos());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();

        self.versions.remove(key);
        self.inner.delete(key)
    }

    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError> {
        self.inner.list_all()
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}
