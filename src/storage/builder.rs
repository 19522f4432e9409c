//! Stack Builder
//!
//! Composes the storage decorators in a fixed order and hands back a façade
//! with typed handles for the optional capabilities, so callers reach TTL,
//! atomic, batch or CAS operations without downcasting the composed store.
//!
//! Wrap order (innermost first):
//! base → TTL → Cache → Compression → Bloom → WAL → Atomic → Batch → CAS.
//! The write-ahead log wraps the durable layers but sits under atomic/CAS so
//! mutations made through `compare_and_set` are logged too.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::atomic::AtomicStore;
use super::batch::BatchStore;
use super::bloom::BloomStore;
use super::cache::{CacheStore, CacheStrategy};
use super::cas::CasStore;
use super::compression::{Codec, CompressedStore};
use super::ttl::TtlStore;
use super::wal::{WalStore, WriteAheadLog};
use super::{Store, StoreError};

pub struct StoreBuilder {
    base: Arc<dyn Store>,
    ttl_cleanup: Option<Duration>,
    cache: Option<(CacheStrategy, usize, Duration)>,
    compression: Option<(Codec, usize)>,
    bloom_expected: Option<usize>,
    wal_dir: Option<PathBuf>,
    atomic: bool,
    batch: bool,
    cas: bool,
}

/// The composed stack plus typed handles to its optional layers.
///
/// `store` is the outermost decorator; all plain reads and writes go through
/// it. The handles share ownership with the chain, so using them observes
/// and is observed by the composed store.
pub struct StoreStack {
    pub store: Arc<dyn Store>,
    pub ttl: Option<Arc<TtlStore>>,
    pub cache: Option<Arc<CacheStore>>,
    pub compression: Option<Arc<CompressedStore>>,
    pub bloom: Option<Arc<BloomStore>>,
    pub atomic: Option<Arc<AtomicStore>>,
    pub batch: Option<Arc<BatchStore>>,
    pub cas: Option<Arc<CasStore>>,
}

impl StoreBuilder {
    pub fn new(base: Arc<dyn Store>) -> Self {
        Self {
            base,
            ttl_cleanup: None,
            cache: None,
            compression: None,
            bloom_expected: None,
            wal_dir: None,
            atomic: false,
            batch: false,
            cas: false,
        }
    }

    pub fn with_ttl(mut self, cleanup_interval: Duration) -> Self {
        self.ttl_cleanup = Some(cleanup_interval);
        self
    }

    pub fn with_cache(mut self, strategy: CacheStrategy, max_size: usize, ttl: Duration) -> Self {
        self.cache = Some((strategy, max_size, ttl));
        self
    }

    pub fn with_compression(mut self, codec: Codec, threshold: usize) -> Self {
        self.compression = Some((codec, threshold));
        self
    }

    pub fn with_bloom_filter(mut self, expected_elements: usize) -> Self {
        self.bloom_expected = Some(expected_elements);
        self
    }

    pub fn with_wal(mut self, data_dir: PathBuf) -> Self {
        self.wal_dir = Some(data_dir);
        self
    }

    pub fn with_atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    pub fn with_batch(mut self) -> Self {
        self.batch = true;
        self
    }

    pub fn with_cas(mut self) -> Self {
        self.cas = true;
        self
    }

    pub fn build(self) -> Result<StoreStack, StoreError> {
        let mut store: Arc<dyn Store> = self.base;

        let ttl = self.ttl_cleanup.map(|cleanup| {
            let layer = Arc::new(TtlStore::new(store.clone(), cleanup));
            store = layer.clone() as Arc<dyn Store>;
            layer
        });

        let cache = self.cache.map(|(strategy, max_size, soft_ttl)| {
            let layer = Arc::new(CacheStore::new(store.clone(), strategy, max_size, soft_ttl));
            store = layer.clone() as Arc<dyn Store>;
            layer
        });

        let compression = self.compression.map(|(codec, threshold)| {
            let layer = Arc::new(CompressedStore::new(store.clone(), codec, threshold));
            store = layer.clone() as Arc<dyn Store>;
            layer
        });

        let bloom = match self.bloom_expected {
            Some(expected) => {
                let layer = Arc::new(BloomStore::new(store.clone(), expected));
                let seeded = layer.rebuild()?;
                tracing::debug!("Bloom filter rebuilt from {} existing keys", seeded);
                store = layer.clone() as Arc<dyn Store>;
                Some(layer)
            }
            None => None,
        };

        if let Some(dir) = self.wal_dir {
            let wal = WriteAheadLog::open(&dir)?;
            let replayed = wal.replay(store.as_ref())?;
            if replayed > 0 {
                tracing::info!("WAL recovery replayed {} records", replayed);
            }
            let layer: Arc<dyn Store> = Arc::new(WalStore::new(store.clone(), wal));
            store = layer;
        }

        let atomic = self.atomic.then(|| {
            let layer = Arc::new(AtomicStore::new(store.clone()));
            store = layer.clone() as Arc<dyn Store>;
            layer
        });

        let batch = self.batch.then(|| {
            let layer = Arc::new(BatchStore::new(store.clone(), ttl.clone()));
            store = layer.clone() as Arc<dyn Store>;
            layer
        });

        let cas = self.cas.then(|| {
            let layer = Arc::new(CasStore::new(store.clone()));
            store = layer.clone() as Arc<dyn Store>;
            layer
        });

        Ok(StoreStack {
            store,
            ttl,
            cache,
            compression,
            bloom,
            atomic,
            batch,
            cas,
        })
    }
}

impl StoreStack {
    /// Starts the background workers the stack needs (currently the TTL
    /// sweeper). Call once after the tokio runtime is up.
    pub fn spawn_background(&self) {
        if let Some(ttl) = &self.ttl {
            ttl.spawn_sweeper();
        }
    }
}
