use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::{KeyValue, Store, StoreError};

/// Expiry layer: keeps a key→deadline index next to the inner store.
///
/// An expired key is treated as absent everywhere: a read that observes the
/// deadline deletes the key eagerly, and a background sweeper removes the
/// rest on a fixed interval.
pub struct TtlStore {
    inner: Arc<dyn Store>,
    expiries: DashMap<String, Instant>,
    cleanup_interval: Duration,
}

impl TtlStore {
    pub fn new(inner: Arc<dyn Store>, cleanup_interval: Duration) -> Self {
        Self {
            inner,
            expiries: DashMap::new(),
            cleanup_interval,
        }
    }

    /// Writes a value that expires after `ttl`. A zero `ttl` clears any
    /// previously recorded expiry, same as a plain `set`.
    pub fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.set(key, value)?;

        if ttl > Duration::ZERO {
            self.expiries.insert(key.to_string(), Instant::now() + ttl);
        } else {
            self.expiries.remove(key);
        }

        Ok(())
    }

    /// Remaining lifetime of `key`, or NotFound when no live expiry exists.
    pub fn get_ttl(&self, key: &str) -> Result<Duration, StoreError> {
        let expiry = self.expiries.get(key).ok_or(StoreError::NotFound)?;

        let remaining = expiry.saturating_duration_since(Instant::now());
        if remaining == Duration::ZERO {
            return Err(StoreError::NotFound);
        }

        Ok(remaining)
    }

    /// Starts the background sweeper on the current tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let ttl = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ttl.cleanup_interval);
            loop {
                interval.tick().await;
                ttl.sweep_expired();
            }
        })
    }

    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .expiries
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| entry.key().clone())
            .collect();

        for key in expired {
            self.expiries.remove(&key);
            if let Err(e) = self.inner.delete(&key) {
                if !e.is_not_found() {
                    tracing::warn!("TTL sweep failed to delete {}: {}", key, e);
                }
            } else {
                tracing::debug!("TTL sweep removed expired key {}", key);
            }
        }
    }

    fn expire_if_due(&self, key: &str) -> bool {
        let due = self
            .expiries
            .get(key)
            .map(|expiry| *expiry.value() <= Instant::now())
            .unwrap_or(false);

        if due {
            self.expiries.remove(key);
            if let Err(e) = self.inner.delete(key) {
                if !e.is_not_found() {
                    tracing::warn!("Failed to delete expired key {}: {}", key, e);
                }
            }
        }

        due
    }
}

impl Store for TtlStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_with_ttl(key, value, Duration::ZERO)
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        if self.expire_if_due(key) {
            return Err(StoreError::NotFound);
        }

        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.expiries.remove(key);
        self.inner.delete(key)
    }

    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError> {
        let now = Instant::now();
        Ok(self
            .inner
            .list_all()?
            .into_iter()
            .filter(|kv| {
                self.expiries
                    .get(&kv.key)
                    .map(|expiry| *expiry.value() > now)
                    .unwrap_or(true)
            })
            .collect())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}
