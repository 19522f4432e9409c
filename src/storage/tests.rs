use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::atomic::AtomicStore;
use super::batch::{BatchKind, BatchOp, BatchStore};
use super::bloom::{BloomFilter, BloomStore};
use super::builder::StoreBuilder;
use super::cache::{CacheStore, CacheStrategy};
use super::cas::CasStore;
use super::compression::{Codec, CompressedStore};
use super::disk::DiskStore;
use super::memory::MemoryStore;
use super::ttl::TtlStore;
use super::version::{
    ClockOrdering, ConflictResolver, ResolutionMode, VectorClock, VersionedValue,
};
use super::wal::{WalStore, WriteAheadLog};
use super::{Store, StoreError};

fn memory() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

// ============================================================
// BASE STORES
// ============================================================

#[test]
fn memory_set_get_roundtrip() {
    let store = memory();
    store.set("a", "1").unwrap();
    assert_eq!(store.get("a").unwrap(), "1");
}

#[test]
fn memory_delete_then_get_is_not_found() {
    let store = memory();
    store.set("a", "1").unwrap();
    store.delete("a").unwrap();
    assert!(matches!(store.get("a"), Err(StoreError::NotFound)));
}

#[test]
fn memory_delete_missing_is_not_found() {
    let store = memory();
    assert!(matches!(store.delete("ghost"), Err(StoreError::NotFound)));
}

#[test]
fn disk_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = DiskStore::open(dir.path()).unwrap();
        store.set("persisted", "yes").unwrap();
        store.set("dropped", "no").unwrap();
        store.delete("dropped").unwrap();
        store.close().unwrap();
    }

    let reopened = DiskStore::open(dir.path()).unwrap();
    assert_eq!(reopened.get("persisted").unwrap(), "yes");
    assert!(matches!(reopened.get("dropped"), Err(StoreError::NotFound)));
}

#[test]
fn disk_store_snapshot_is_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskStore::open(dir.path()).unwrap();
    store.set("k", "v").unwrap();

    let raw = std::fs::read_to_string(dir.path().join("data.json")).unwrap();
    let snapshot: HashMap<String, String> = serde_json::from_str(&raw).unwrap();
    assert_eq!(snapshot.get("k").map(String::as_str), Some("v"));
}

// ============================================================
// TTL LAYER
// ============================================================

#[test]
fn ttl_expires_key_and_removes_from_base() {
    let base = memory();
    let ttl = TtlStore::new(base.clone(), Duration::from_secs(60));

    ttl.set_with_ttl("a", "1", Duration::from_millis(100)).unwrap();
    assert_eq!(ttl.get("a").unwrap(), "1");

    std::thread::sleep(Duration::from_millis(150));
    assert!(matches!(ttl.get("a"), Err(StoreError::NotFound)));
    // The expired read deletes eagerly, the base store must agree.
    assert!(matches!(base.get("a"), Err(StoreError::NotFound)));
}

#[test]
fn ttl_plain_set_clears_expiry() {
    let base = memory();
    let ttl = TtlStore::new(base, Duration::from_secs(60));

    ttl.set_with_ttl("a", "1", Duration::from_millis(50)).unwrap();
    ttl.set("a", "2").unwrap();

    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(ttl.get("a").unwrap(), "2");
}

#[test]
fn ttl_sweeper_removes_expired_entries() {
    let base = memory();
    let ttl = TtlStore::new(base.clone(), Duration::from_secs(60));

    ttl.set_with_ttl("gone", "x", Duration::from_millis(30)).unwrap();
    ttl.set_with_ttl("kept", "y", Duration::from_secs(60)).unwrap();

    std::thread::sleep(Duration::from_millis(60));
    ttl.sweep_expired();

    assert!(matches!(base.get("gone"), Err(StoreError::NotFound)));
    assert_eq!(base.get("kept").unwrap(), "y");
}

#[test]
fn ttl_remaining_lifetime_is_reported() {
    let base = memory();
    let ttl = TtlStore::new(base, Duration::from_secs(60));

    ttl.set_with_ttl("a", "1", Duration::from_secs(30)).unwrap();
    let remaining = ttl.get_ttl("a").unwrap();
    assert!(remaining <= Duration::from_secs(30));
    assert!(remaining > Duration::from_secs(25));

    assert!(matches!(ttl.get_ttl("no-ttl"), Err(StoreError::NotFound)));
}

#[test]
fn ttl_list_all_hides_expired_keys() {
    let base = memory();
    let ttl = TtlStore::new(base, Duration::from_secs(60));

    ttl.set("plain", "1").unwrap();
    ttl.set_with_ttl("expiring", "2", Duration::from_millis(30)).unwrap();

    std::thread::sleep(Duration::from_millis(60));
    let keys: Vec<String> = ttl.list_all().unwrap().into_iter().map(|kv| kv.key).collect();
    assert!(keys.contains(&"plain".to_string()));
    assert!(!keys.contains(&"expiring".to_string()));
}

// ============================================================
// CACHE LAYER
// ============================================================

#[test]
fn cache_serves_hits_and_counts_misses() {
    let base = memory();
    let cache = CacheStore::new(base.clone(), CacheStrategy::Lru, 10, Duration::from_secs(60));

    cache.set("a", "1").unwrap();
    assert_eq!(cache.get("a").unwrap(), "1");

    // Value only present below the cache still gets served and cached.
    base.set("b", "2").unwrap();
    assert_eq!(cache.get("b").unwrap(), "2");
    assert_eq!(cache.get("b").unwrap(), "2");

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}

#[test]
fn cache_evicts_lru_victim_at_capacity() {
    let base = memory();
    let cache = CacheStore::new(base, CacheStrategy::Lru, 2, Duration::from_secs(60));

    cache.set("a", "1").unwrap();
    cache.set("b", "2").unwrap();
    // Touch "a" so "b" is the least recently used.
    cache.get("a").unwrap();
    cache.set("c", "3").unwrap();

    assert_eq!(cache.stats().evictions, 1);
    // All values still readable through the write-through inner store.
    assert_eq!(cache.get("a").unwrap(), "1");
    assert_eq!(cache.get("b").unwrap(), "2");
    assert_eq!(cache.get("c").unwrap(), "3");
}

#[test]
fn cache_lfu_evicts_least_frequent() {
    let base = memory();
    let cache = CacheStore::new(base.clone(), CacheStrategy::Lfu, 2, Duration::from_secs(60));

    cache.set("hot", "1").unwrap();
    cache.set("cold", "2").unwrap();
    for _ in 0..5 {
        cache.get("hot").unwrap();
    }

    cache.set("new", "3").unwrap();
    assert_eq!(cache.stats().evictions, 1);

    // "cold" was evicted: reading it again goes to the inner store (a miss).
    let misses_before = cache.stats().misses;
    assert_eq!(cache.get("cold").unwrap(), "2");
    assert_eq!(cache.stats().misses, misses_before + 1);
}

#[test]
fn cache_soft_ttl_treats_stale_entry_as_absent() {
    let base = memory();
    let cache = CacheStore::new(base.clone(), CacheStrategy::Lru, 10, Duration::from_millis(40));

    cache.set("a", "1").unwrap();
    // Make the cached copy stale, then change the inner store directly.
    std::thread::sleep(Duration::from_millis(60));
    base.set("a", "fresh").unwrap();

    assert_eq!(cache.get("a").unwrap(), "fresh");
}

#[test]
fn cache_counters_are_monotonic() {
    let base = memory();
    let cache = CacheStore::new(base, CacheStrategy::Lru, 2, Duration::from_secs(60));

    let mut last = (0, 0, 0);
    for i in 0..20 {
        let key = format!("k{}", i % 4);
        cache.set(&key, "v").unwrap();
        let _ = cache.get(&key);
        let _ = cache.get("missing");

        let stats = cache.stats();
        let now = (stats.hits, stats.misses, stats.evictions);
        assert!(now.0 >= last.0 && now.1 >= last.1 && now.2 >= last.2);
        last = now;
    }
}

#[test]
fn cache_preload_warms_from_inner() {
    let base = memory();
    base.set("warm", "1").unwrap();
    let cache = CacheStore::new(base, CacheStrategy::Lru, 10, Duration::from_secs(60));

    cache.preload(&["warm".to_string(), "missing".to_string()]);

    assert_eq!(cache.get("warm").unwrap(), "1");
    assert_eq!(cache.stats().hits, 1);
}

// ============================================================
// COMPRESSION LAYER
// ============================================================

#[test]
fn compression_roundtrips_large_values() {
    let base = memory();
    let store = CompressedStore::new(base.clone(), Codec::Gzip, 64);

    let value = "x".repeat(4096);
    store.set("big", &value).unwrap();

    assert_eq!(store.get("big").unwrap(), value);
    // The stored form is the marker plus the compressed payload.
    let stored = base.get("big").unwrap();
    assert!(stored.starts_with("\u{0}gz\u{0}"));
    assert!(stored.len() < value.len());
}

#[test]
fn compression_skips_small_values() {
    let base = memory();
    let store = CompressedStore::new(base.clone(), Codec::Gzip, 64);

    store.set("small", "tiny").unwrap();
    assert_eq!(base.get("small").unwrap(), "tiny");
    assert_eq!(store.get("small").unwrap(), "tiny");
}

#[test]
fn compression_zlib_roundtrip() {
    let base = memory();
    let store = CompressedStore::new(base, Codec::Zlib, 16);

    let value = "abcdefgh".repeat(100);
    store.set("z", &value).unwrap();
    assert_eq!(store.get("z").unwrap(), value);
}

#[test]
fn compression_list_all_returns_plaintext() {
    let base = memory();
    let store = CompressedStore::new(base, Codec::Gzip, 16);

    let value = "payload ".repeat(50);
    store.set("k", &value).unwrap();

    let items = store.list_all().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].value, value);
}

#[test]
fn compression_stats_count_compressed_items() {
    let base = memory();
    let store = CompressedStore::new(base, Codec::Gzip, 32);

    store.set("small", "x").unwrap();
    store.set("large", &"y".repeat(500)).unwrap();

    let stats = store.stats();
    assert_eq!(stats.total_items, 2);
    assert_eq!(stats.compressed_items, 1);
}

// ============================================================
// BLOOM FILTER LAYER
// ============================================================

#[test]
fn bloom_has_no_false_negatives() {
    let filter = BloomFilter::new(1000, 0.01);
    for i in 0..1000 {
        filter.add(&format!("key-{}", i));
    }
    for i in 0..1000 {
        assert!(filter.contains(&format!("key-{}", i)));
    }
}

#[test]
fn bloom_short_circuits_unknown_keys() {
    let base = memory();
    let store = BloomStore::new(base.clone(), 100);

    store.set("present", "1").unwrap();

    // Key written below the filter: a negative test hides it, which is the
    // short-circuit the layer exists for.
    base.set("smuggled", "2").unwrap();
    assert!(matches!(store.get("smuggled"), Err(StoreError::NotFound)));
    assert_eq!(store.get("present").unwrap(), "1");
}

#[test]
fn bloom_rebuild_seeds_filter_from_existing_keys() {
    let base = memory();
    base.set("old-1", "a").unwrap();
    base.set("old-2", "b").unwrap();

    let store = BloomStore::new(base, 100);
    assert_eq!(store.rebuild().unwrap(), 2);

    assert_eq!(store.get("old-1").unwrap(), "a");
    assert_eq!(store.get("old-2").unwrap(), "b");
}

#[test]
fn bloom_delete_leaves_bits_set() {
    let base = memory();
    let store = BloomStore::new(base, 100);

    store.set("k", "v").unwrap();
    store.delete("k").unwrap();

    // The filter still claims membership; the inner store answers NotFound.
    assert!(matches!(store.get("k"), Err(StoreError::NotFound)));
    let stats = store.filter_stats();
    assert!(stats.set_bits > 0);
}

// ============================================================
// WRITE-AHEAD LOG
// ============================================================

#[test]
fn wal_replay_reproduces_live_state() {
    let dir = tempfile::tempdir().unwrap();

    let live = memory();
    {
        let wal = WriteAheadLog::open(dir.path()).unwrap();
        let store = WalStore::new(live.clone(), wal);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "3").unwrap();
        store.delete("b").unwrap();
        store.close().unwrap();
    }

    let fresh = memory();
    let wal = WriteAheadLog::open(dir.path()).unwrap();
    wal.replay(fresh.as_ref()).unwrap();

    let mut live_items = live.list_all().unwrap();
    let mut replayed_items = fresh.list_all().unwrap();
    live_items.sort_by(|a, b| a.key.cmp(&b.key));
    replayed_items.sort_by(|a, b| a.key.cmp(&b.key));
    assert_eq!(live_items, replayed_items);
}

#[test]
fn wal_sequence_continues_after_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let wal = WriteAheadLog::open(dir.path()).unwrap();
        wal.log_set("a", "1").unwrap();
        wal.log_set("b", "2").unwrap();
        wal.close().unwrap();
    }
    {
        let wal = WriteAheadLog::open(dir.path()).unwrap();
        wal.log_delete("a").unwrap();
        wal.close().unwrap();
    }

    let raw = std::fs::read_to_string(dir.path().join("wal.log")).unwrap();
    let sequences: Vec<u64> = raw
        .lines()
        .map(|line| {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            record["sequence"].as_u64().unwrap()
        })
        .collect();

    assert_eq!(sequences, vec![0, 1, 2]);
}

#[test]
fn wal_replay_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();

    let wal = WriteAheadLog::open(dir.path()).unwrap();
    wal.log_set("a", "1").unwrap();
    wal.log_delete("a").unwrap();
    wal.log_set("b", "2").unwrap();

    let store = memory();
    wal.replay(store.as_ref()).unwrap();
    wal.replay(store.as_ref()).unwrap();

    assert!(matches!(store.get("a"), Err(StoreError::NotFound)));
    assert_eq!(store.get("b").unwrap(), "2");
}

// ============================================================
// ATOMIC LAYER
// ============================================================

#[test]
fn atomic_increment_counts_from_zero() {
    let store = AtomicStore::new(memory());

    assert_eq!(store.increment("counter", 5).unwrap(), 5);
    assert_eq!(store.increment("counter", 3).unwrap(), 8);
    assert_eq!(store.decrement("counter", 10).unwrap(), -2);
    assert_eq!(store.get_int("counter").unwrap(), -2);
}

#[test]
fn atomic_increment_rejects_non_integers() {
    let base = memory();
    base.set("text", "hello").unwrap();
    let store = AtomicStore::new(base);

    assert!(matches!(
        store.increment("text", 1),
        Err(StoreError::InvalidType(_))
    ));
}

#[test]
fn atomic_compare_and_swap_on_value() {
    let store = AtomicStore::new(memory());

    // Empty expectation matches a missing key.
    assert!(store.compare_and_swap("k", "", "v1").unwrap());
    assert!(store.compare_and_swap("k", "v1", "v2").unwrap());
    assert!(!store.compare_and_swap("k", "v1", "v3").unwrap());
    assert_eq!(store.get("k").unwrap(), "v2");
}

// ============================================================
// BATCH LAYER
// ============================================================

#[test]
fn batch_executes_ops_in_order() {
    let store = BatchStore::new(memory(), None);

    let results = store.execute_batch(&[
        BatchOp {
            kind: BatchKind::Set,
            key: "a".to_string(),
            value: Some("1".to_string()),
            ttl_secs: None,
        },
        BatchOp {
            kind: BatchKind::Get,
            key: "a".to_string(),
            value: None,
            ttl_secs: None,
        },
        BatchOp {
            kind: BatchKind::Delete,
            key: "a".to_string(),
            value: None,
            ttl_secs: None,
        },
    ]);

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.error.is_none()));
    assert_eq!(results[1].value.as_deref(), Some("1"));
}

#[test]
fn batch_failure_does_not_roll_back_earlier_ops() {
    let store = BatchStore::new(memory(), None);

    let results = store.execute_batch(&[
        BatchOp {
            kind: BatchKind::Set,
            key: "kept".to_string(),
            value: Some("1".to_string()),
            ttl_secs: None,
        },
        BatchOp {
            kind: BatchKind::Delete,
            key: "ghost".to_string(),
            value: None,
            ttl_secs: None,
        },
        BatchOp {
            kind: BatchKind::Set,
            key: "also-kept".to_string(),
            value: Some("2".to_string()),
            ttl_secs: None,
        },
    ]);

    assert!(results[0].error.is_none());
    assert!(results[1].error.is_some());
    assert!(results[2].error.is_none());
    assert_eq!(store.get("kept").unwrap(), "1");
    assert_eq!(store.get("also-kept").unwrap(), "2");
}

#[test]
fn batch_set_honors_ttl_through_handle() {
    let base = memory();
    let ttl = Arc::new(TtlStore::new(base.clone(), Duration::from_secs(60)));
    let store = BatchStore::new(ttl.clone() as Arc<dyn Store>, Some(ttl.clone()));

    store.execute_batch(&[BatchOp {
        kind: BatchKind::Set,
        key: "short".to_string(),
        value: Some("x".to_string()),
        ttl_secs: Some(5),
    }]);

    // The TTL layer recorded an expiry for the batched set.
    assert_eq!(base.get("short").unwrap(), "x");
    assert!(ttl.get_ttl("short").unwrap() <= Duration::from_secs(5));
}

#[test]
fn batch_multi_get_skips_missing_keys() {
    let store = BatchStore::new(memory(), None);
    store.set("a", "1").unwrap();

    let results = store
        .multi_get(&["a".to_string(), "missing".to_string()])
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results.get("a").map(String::as_str), Some("1"));
}

#[test]
fn batch_multi_set_writes_every_pair() {
    let store = BatchStore::new(memory(), None);

    let mut items = HashMap::new();
    items.insert("x".to_string(), "1".to_string());
    items.insert("y".to_string(), "2".to_string());
    store.multi_set(&items).unwrap();

    assert_eq!(store.get("x").unwrap(), "1");
    assert_eq!(store.get("y").unwrap(), "2");
}

// ============================================================
// CAS AND LOCKING
// ============================================================

#[test]
fn cas_succeeds_then_reports_conflict() {
    let store = CasStore::new(memory());
    store.set("c", "v0").unwrap();

    let first = store.compare_and_set("c", "v0", "v1", 0).unwrap();
    assert!(first.success);
    assert!(first.version > 0);

    // Stale expectation: precondition fails, current value is reported.
    let second = store.compare_and_set("c", "v0", "v2", 0).unwrap();
    assert!(!second.success);
    assert_eq!(second.current_value.as_deref(), Some("v1"));
}

#[test]
fn cas_checks_version_when_given() {
    let store = CasStore::new(memory());
    store.set("k", "v").unwrap();
    let (_, version) = store.get_with_version("k").unwrap();

    let wrong = store.compare_and_set("k", "v", "v2", version + 1).unwrap();
    assert!(!wrong.success);

    let right = store.compare_and_set("k", "v", "v2", version).unwrap();
    assert!(right.success);
}

#[test]
fn cas_missing_key_matches_empty_expectation() {
    let store = CasStore::new(memory());

    let created = store.compare_and_set("fresh", "", "v", 0).unwrap();
    assert!(created.success);

    let refused = store.compare_and_set("other", "something", "v", 0).unwrap();
    assert!(!refused.success);
}

#[test]
fn lock_excludes_second_caller_until_expiry() {
    let store = CasStore::new(memory());

    assert!(store.acquire_lock("L", Duration::from_millis(100)).unwrap());
    assert!(!store.acquire_lock("L", Duration::from_millis(100)).unwrap());

    // After the embedded expiry passes, a third caller reclaims the lock.
    std::thread::sleep(Duration::from_millis(150));
    assert!(store.acquire_lock("L", Duration::from_millis(100)).unwrap());
}

#[test]
fn lock_release_frees_immediately() {
    let store = CasStore::new(memory());

    assert!(store.acquire_lock("L", Duration::from_secs(30)).unwrap());
    store.release_lock("L").unwrap();
    assert!(store.acquire_lock("L", Duration::from_secs(30)).unwrap());

    // Releasing an unheld lock is fine.
    store.release_lock("never-held").unwrap();
}

// ============================================================
// VECTOR CLOCKS
// ============================================================

#[test]
fn vector_clock_compare_orderings() {
    let mut a = VectorClock::new();
    a.increment("n1");

    let mut b = a.clone();
    b.increment("n1");
    assert_eq!(a.compare(&b), ClockOrdering::Less);
    assert_eq!(b.compare(&a), ClockOrdering::Greater);
    assert_eq!(a.compare(&a.clone()), ClockOrdering::Equal);

    let mut c = VectorClock::new();
    c.increment("n2");
    assert_eq!(a.compare(&c), ClockOrdering::Concurrent);
}

#[test]
fn vector_clock_merge_takes_pointwise_max() {
    let mut a = VectorClock::new();
    a.increment("n1");
    a.increment("n1");

    let mut b = VectorClock::new();
    b.increment("n1");
    b.increment("n2");

    a.merge(&b);
    assert_eq!(a.0.get("n1"), Some(&2));
    assert_eq!(a.0.get("n2"), Some(&1));
}

#[test]
fn resolve_is_commutative() {
    let resolver = ConflictResolver::new("n1");

    let mut clock_a = VectorClock::new();
    clock_a.increment("n1");
    let mut clock_b = VectorClock::new();
    clock_b.increment("n2");

    let a = VersionedValue {
        value: "from-n1".to_string(),
        vector_clock: clock_a,
        timestamp: 100,
    };
    let b = VersionedValue {
        value: "from-n2".to_string(),
        vector_clock: clock_b,
        timestamp: 200,
    };

    let ab = resolver.resolve(a.clone(), b.clone());
    let ba = resolver.resolve(b, a);
    assert_eq!(ab.value, ba.value);
    assert_eq!(ab.value, "from-n2"); // concurrent → larger timestamp wins
}

#[test]
fn resolve_prefers_causal_winner_over_timestamp() {
    let resolver = ConflictResolver::new("n1");

    let mut older_clock = VectorClock::new();
    older_clock.increment("n1");
    let mut newer_clock = older_clock.clone();
    newer_clock.increment("n1");

    let causal_winner = VersionedValue {
        value: "newer-history".to_string(),
        vector_clock: newer_clock,
        timestamp: 1, // deliberately older timestamp
    };
    let causal_loser = VersionedValue {
        value: "older-history".to_string(),
        vector_clock: older_clock,
        timestamp: 999,
    };

    let winner = resolver.resolve(causal_loser, causal_winner);
    assert_eq!(winner.value, "newer-history");
}

#[test]
fn lww_mode_ignores_causal_history() {
    let resolver = ConflictResolver::new("n1").with_mode(ResolutionMode::Lww);

    let mut older_clock = VectorClock::new();
    older_clock.increment("n1");
    let mut newer_clock = older_clock.clone();
    newer_clock.increment("n1");

    let causally_newer = VersionedValue {
        value: "causal".to_string(),
        vector_clock: newer_clock,
        timestamp: 1,
    };
    let later_write = VersionedValue {
        value: "later".to_string(),
        vector_clock: older_clock,
        timestamp: 999,
    };

    // Pure LWW: the larger timestamp wins even against a causal descendant.
    let winner = resolver.resolve(causally_newer, later_write);
    assert_eq!(winner.value, "later");
}

#[test]
fn versioned_write_bumps_own_counter() {
    let resolver = ConflictResolver::new("n7");
    let versioned = resolver.versioned("v");

    assert_eq!(versioned.vector_clock.0.get("n7"), Some(&1));
    assert!(versioned.timestamp > 0);
}

// ============================================================
// COMPOSED STACK
// ============================================================

#[test]
fn full_stack_roundtrips_through_every_layer() {
    let dir = tempfile::tempdir().unwrap();

    let stack = StoreBuilder::new(memory())
        .with_ttl(Duration::from_secs(60))
        .with_cache(CacheStrategy::Lru, 100, Duration::from_secs(60))
        .with_compression(Codec::Gzip, 64)
        .with_bloom_filter(1000)
        .with_wal(dir.path().to_path_buf())
        .with_atomic()
        .with_batch()
        .with_cas()
        .build()
        .unwrap();

    let large = "data ".repeat(100);
    stack.store.set("small", "v").unwrap();
    stack.store.set("large", &large).unwrap();

    assert_eq!(stack.store.get("small").unwrap(), "v");
    assert_eq!(stack.store.get("large").unwrap(), large);

    stack.store.delete("small").unwrap();
    assert!(matches!(stack.store.get("small"), Err(StoreError::NotFound)));
}

#[test]
fn stack_handles_observe_the_composed_store() {
    let stack = StoreBuilder::new(memory())
        .with_ttl(Duration::from_secs(60))
        .with_atomic()
        .with_cas()
        .build()
        .unwrap();

    // A counter written through the atomic handle is readable as a plain key.
    stack.atomic.as_ref().unwrap().increment("hits", 41).unwrap();
    stack.atomic.as_ref().unwrap().increment("hits", 1).unwrap();
    assert_eq!(stack.store.get("hits").unwrap(), "42");

    // A CAS through the handle is visible to plain reads too.
    let result = stack
        .cas
        .as_ref()
        .unwrap()
        .compare_and_set("cfg", "", "on", 0)
        .unwrap();
    assert!(result.success);
    assert_eq!(stack.store.get("cfg").unwrap(), "on");
}

#[test]
fn cas_mutations_reach_the_wal() {
    let dir = tempfile::tempdir().unwrap();

    let stack = StoreBuilder::new(memory())
        .with_wal(dir.path().to_path_buf())
        .with_cas()
        .build()
        .unwrap();

    let result = stack
        .cas
        .as_ref()
        .unwrap()
        .compare_and_set("k", "", "v", 0)
        .unwrap();
    assert!(result.success);

    let raw = std::fs::read_to_string(dir.path().join("wal.log")).unwrap();
    assert!(raw.contains("\"SET\""));
    assert!(raw.contains("\"k\""));
}

#[test]
fn wal_recovery_restores_state_into_fresh_stack() {
    let dir = tempfile::tempdir().unwrap();

    {
        let stack = StoreBuilder::new(memory())
            .with_wal(dir.path().to_path_buf())
            .build()
            .unwrap();
        stack.store.set("a", "1").unwrap();
        stack.store.set("b", "2").unwrap();
        stack.store.delete("a").unwrap();
        stack.store.close().unwrap();
    }

    // New process, empty base: WAL replay rebuilds the surviving state.
    let stack = StoreBuilder::new(memory())
        .with_wal(dir.path().to_path_buf())
        .build()
        .unwrap();
    assert!(matches!(stack.store.get("a"), Err(StoreError::NotFound)));
    assert_eq!(stack.store.get("b").unwrap(), "2");
}
