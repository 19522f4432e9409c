use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::ttl::TtlStore;
use super::{KeyValue, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Set,
    Delete,
    Get,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOp {
    #[serde(rename = "type")]
    pub kind: BatchKind,
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    /// TTL in seconds for set ops; only honored when the stack has a TTL layer.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOpResult {
    pub key: String,
    pub kind: BatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ordered multi-operation execution. The batch holds the layer mutex for
/// its whole run, so concurrent batches on one node serialize, but it is
/// NOT atomic: a failed op does not roll back earlier ops, each result
/// carries its own error.
pub struct BatchStore {
    inner: Arc<dyn Store>,
    ttl: Option<Arc<TtlStore>>,
    lock: Mutex<()>,
}

impl BatchStore {
    pub fn new(inner: Arc<dyn Store>, ttl: Option<Arc<TtlStore>>) -> Self {
        Self {
            inner,
            ttl,
            lock: Mutex::new(()),
        }
    }

    pub fn execute_batch(&self, ops: &[BatchOp]) -> Vec<BatchOpResult> {
        let _guard = self.lock.lock();

        ops.iter().map(|op| self.execute_one(op)).collect()
    }

    fn execute_one(&self, op: &BatchOp) -> BatchOpResult {
        let mut result = BatchOpResult {
            key: op.key.clone(),
            kind: op.kind,
            value: None,
            error: None,
        };

        let outcome = match op.kind {
            BatchKind::Set => {
                let value = op.value.as_deref().unwrap_or("");
                match (op.ttl_secs, &self.ttl) {
                    (Some(secs), Some(ttl)) if secs > 0 => {
                        ttl.set_with_ttl(&op.key, value, Duration::from_secs(secs))
                    }
                    _ => self.inner.set(&op.key, value),
                }
            }
            BatchKind::Delete => self.inner.delete(&op.key),
            BatchKind::Get => match self.inner.get(&op.key) {
                Ok(value) => {
                    result.value = Some(value);
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = outcome {
            result.error = Some(e.to_string());
        }

        result
    }

    /// Point reads for several keys; missing keys are simply absent from the
    /// result map.
    pub fn multi_get(&self, keys: &[String]) -> Result<HashMap<String, String>, StoreError> {
        let mut results = HashMap::new();

        for key in keys {
            match self.inner.get(key) {
                Ok(value) => {
                    results.insert(key.clone(), value);
                }
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(results)
    }

    pub fn multi_set(&self, items: &HashMap<String, String>) -> Result<(), StoreError> {
        let ops: Vec<BatchOp> = items
            .iter()
            .map(|(key, value)| BatchOp {
                kind: BatchKind::Set,
                key: key.clone(),
                value: Some(value.clone()),
                ttl_secs: None,
            })
            .collect();

        for result in self.execute_batch(&ops) {
            if let Some(error) = result.error {
                return Err(StoreError::Corrupt(error));
            }
        }

        Ok(())
    }
}

impl Store for BatchStore {
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
