use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use super::{KeyValue, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Least Recently Used
    Lru,
    /// Least Frequently Used
    Lfu,
    /// Adaptive Replacement Cache
    Arc,
}

struct CacheEntry {
    value: String,
    last_access: Instant,
    access_count: u64,
}

// Lookup map and recency order are guarded as one unit; they must always
// agree on membership.
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    // Front = most recently used.
    order: Vec<String>,
}

/// Monotonic counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded read cache in front of the inner store.
///
/// Writes go through to the inner store first, then update the cache. Reads
/// served from the cache respect a soft per-entry TTL; entries older than the
/// TTL are treated as absent.
pub struct CacheStore {
    inner: Arc<dyn Store>,
    cache: Mutex<CacheInner>,
    strategy: CacheStrategy,
    max_size: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStore {
    pub fn new(
        inner: Arc<dyn Store>,
        strategy: CacheStrategy,
        max_size: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: Vec::new(),
            }),
            strategy,
            max_size: max_size.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn hit_rate(&self) -> f64 {
        let stats = self.stats();
        let total = stats.hits + stats.misses;
        if total == 0 {
            return 0.0;
        }
        stats.hits as f64 / total as f64
    }

    /// Warms the cache with hot keys read from the inner store.
    pub fn preload(&self, keys: &[String]) {
        let mut cache = self.cache.lock();
        for key in keys {
            if cache.map.contains_key(key) {
                continue;
            }
            if let Ok(value) = self.inner.get(key) {
                Self::insert_locked(
                    &mut cache,
                    self.strategy,
                    self.max_size,
                    &self.evictions,
                    key,
                    value,
                );
            }
        }
    }

    fn insert_locked(
        cache: &mut CacheInner,
        strategy: CacheStrategy,
        max_size: usize,
        evictions: &AtomicU64,
        key: &str,
        value: String,
    ) {
        if let Some(entry) = cache.map.get_mut(key) {
            entry.value = value;
            entry.last_access = Instant::now();
            entry.access_count += 1;
            Self::move_to_front(&mut cache.order, key);
            return;
        }

        if cache.map.len() >= max_size {
            Self::evict_locked(cache, strategy, evictions);
        }

        cache.map.insert(
            key.to_string(),
            CacheEntry {
                value,
                last_access: Instant::now(),
                access_count: 1,
            },
        );
        cache.order.insert(0, key.to_string());
    }

    fn evict_locked(cache: &mut CacheInner, strategy: CacheStrategy, evictions: &AtomicU64) {
        let victim = match strategy {
            CacheStrategy::Lfu => cache
                .order
                .iter()
                .rev()
                .min_by_key(|key| cache.map.get(*key).map(|e| e.access_count).unwrap_or(0))
                .cloned(),
            // LRU; ARC degrades to the recency victim as well.
            _ => cache.order.last().cloned(),
        };

        if let Some(victim) = victim {
            cache.map.remove(&victim);
            cache.order.retain(|k| k != &victim);
            evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn move_to_front(order: &mut Vec<String>, key: &str) {
        if let Some(pos) = order.iter().position(|k| k == key) {
            let entry = order.remove(pos);
            order.insert(0, entry);
        }
    }

    fn remove_locked(cache: &mut CacheInner, key: &str) {
        cache.map.remove(key);
        cache.order.retain(|k| k != key);
    }
}

impl Store for CacheStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // Inner store first, then the cache, so a failed write never leaves
        // a phantom cache entry.
        self.inner.set(key, value)?;

        let mut cache = self.cache.lock();
        Self::insert_locked(
            &mut cache,
            self.strategy,
            self.max_size,
            &self.evictions,
            key,
            value.to_string(),
        );

        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.map.get_mut(key) {
                if entry.last_access.elapsed() > self.ttl {
                    Self::remove_locked(&mut cache, key);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                } else {
                    entry.last_access = Instant::now();
                    entry.access_count += 1;
                    let value = entry.value.clone();
                    if self.strategy == CacheStrategy::Lru {
                        Self::move_to_front(&mut cache.order, key);
                    }
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        let value = self.inner.get(key)?;

        let mut cache = self.cache.lock();
        Self::insert_locked(
            &mut cache,
            self.strategy,
            self.max_size,
            &self.evictions,
            key,
            value.clone(),
        );

        Ok(value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        {
            let mut cache = self.cache.lock();
            Self::remove_locked(&mut cache, key);
        }

        self.inner.delete(key)
    }

    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError> {
        self.inner.list_all()
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}
