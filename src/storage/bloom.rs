use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::{KeyValue, Store, StoreError};

/// Fixed-width Bloom filter sized from the expected element count and target
/// false-positive rate. `k` hash indices are derived from one fast hash run
/// with distinct seeds. Bits are never cleared; the filter is rebuilt from
/// the underlying key set only at startup.
pub struct BloomFilter {
    bits: RwLock<Vec<bool>>,
    size: usize,
    num_hashes: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BloomStats {
    pub size: usize,
    pub set_bits: usize,
    pub fill_ratio: f64,
    pub hash_functions: u32,
}

impl BloomFilter {
    pub fn new(expected_elements: usize, false_positive_rate: f64) -> Self {
        let n = expected_elements.max(1) as f64;
        // m = -n * ln(p) / ln(2)^2
        let size = (-n * false_positive_rate.ln() / (std::f64::consts::LN_2.powi(2))).ceil()
            as usize;
        let size = size.max(8);
        // k = m/n * ln(2)
        let num_hashes = ((size as f64 / n) * std::f64::consts::LN_2).round().max(1.0) as u32;

        Self {
            bits: RwLock::new(vec![false; size]),
            size,
            num_hashes,
        }
    }

    fn indices(&self, key: &str) -> Vec<usize> {
        (0..self.num_hashes)
            .map(|seed| {
                let mut hasher = DefaultHasher::new();
                seed.hash(&mut hasher);
                key.hash(&mut hasher);
                (hasher.finish() % self.size as u64) as usize
            })
            .collect()
    }

    pub fn add(&self, key: &str) {
        let indices = self.indices(key);
        let mut bits = self.bits.write();
        for idx in indices {
            bits[idx] = true;
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let indices = self.indices(key);
        let bits = self.bits.read();
        indices.into_iter().all(|idx| bits[idx])
    }

    pub fn stats(&self) -> BloomStats {
        let bits = self.bits.read();
        let set_bits = bits.iter().filter(|bit| **bit).count();

        BloomStats {
            size: self.size,
            set_bits,
            fill_ratio: set_bits as f64 / self.size as f64,
            hash_functions: self.num_hashes,
        }
    }
}

/// Read-path short-circuit: a negative filter test answers NotFound without
/// touching the inner store. False positives only cost an inner lookup; a
/// false negative is impossible by construction.
pub struct BloomStore {
    inner: Arc<dyn Store>,
    filter: BloomFilter,
}

impl BloomStore {
    /// Default false-positive target of 1%.
    pub fn new(inner: Arc<dyn Store>, expected_elements: usize) -> Self {
        Self {
            inner,
            filter: BloomFilter::new(expected_elements, 0.01),
        }
    }

    /// Re-seeds the filter from the keys currently held below, called once
    /// at startup. Deletes never clear bits, so this is the only point where
    /// the fill ratio can shrink.
    pub fn rebuild(&self) -> Result<usize, StoreError> {
        let items = self.inner.list_all()?;
        for item in &items {
            self.filter.add(&item.key);
        }
        Ok(items.len())
    }

    pub fn filter_stats(&self) -> BloomStats {
        self.filter.stats()
    }
}

impl Store for BloomStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)?;
        self.filter.add(key);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        if !self.filter.contains(key) {
            return Err(StoreError::NotFound);
        }

        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        // Bits stay set; the filter only over-approximates after deletes.
        self.inner.delete(key)
    }

    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError> {
        self.inner.list_all()
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}
