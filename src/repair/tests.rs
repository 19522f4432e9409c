use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use dashmap::DashMap;

use crate::replication::protocol::ValueResponse;
use crate::storage::memory::MemoryStore;
use crate::storage::{KeyValue, Store};

use super::merkle::{compare_trees, MerkleTree};
use super::service::RepairService;

// ============================================================
// MERKLE TREES
// ============================================================

#[test]
fn root_is_deterministic_in_the_key_set() {
    let forward = MerkleTree::build(vec!["k1".into(), "k2".into(), "k3".into()]);
    let shuffled = MerkleTree::build(vec!["k3".into(), "k1".into(), "k2".into()]);

    assert_eq!(forward.root_hash(), shuffled.root_hash());
    assert_eq!(forward.leaf_count(), 3);
}

#[test]
fn different_key_sets_have_different_roots() {
    let a = MerkleTree::build(vec!["k1".into(), "k2".into()]);
    let b = MerkleTree::build(vec!["k1".into(), "k3".into()]);
    assert_ne!(a.root_hash(), b.root_hash());
}

#[test]
fn empty_tree_has_a_stable_root() {
    let a = MerkleTree::build(vec![]);
    let b = MerkleTree::build(vec![]);
    assert_eq!(a.root_hash(), b.root_hash());
    assert_eq!(a.leaf_count(), 0);
}

#[test]
fn odd_width_levels_duplicate_the_last_node() {
    // 3 leaves exercise the odd-width path; the build must not panic and
    // must stay deterministic.
    let a = MerkleTree::build(vec!["a".into(), "b".into(), "c".into()]);
    let b = MerkleTree::build(vec!["c".into(), "b".into(), "a".into()]);
    assert_eq!(a.root_hash(), b.root_hash());
}

#[test]
fn comparing_identical_trees_yields_no_diffs() {
    let a = MerkleTree::build(vec!["k1".into(), "k2".into()]);
    let b = MerkleTree::build(vec!["k1".into(), "k2".into()]);
    assert!(compare_trees(&a, &b).is_empty());
}

#[test]
fn comparing_divergent_trees_yields_diffs() {
    // Store A holds {k1,k2}, store B holds {k1,k3}.
    let a = MerkleTree::build(vec!["k1".into(), "k2".into()]);
    let b = MerkleTree::build(vec!["k1".into(), "k3".into()]);

    let diffs = compare_trees(&a, &b);
    assert!(!diffs.is_empty());
    assert!(diffs.iter().any(|d| d.reason.contains("key difference")));
}

#[test]
fn missing_subtrees_are_reported_by_side() {
    let small = MerkleTree::build(vec!["k1".into()]);
    let large = MerkleTree::build(vec!["k1".into(), "k2".into(), "k3".into(), "k4".into()]);

    let diffs = compare_trees(&small, &large);
    assert!(diffs
        .iter()
        .any(|d| d.reason.contains("missing in first tree")));
}

// ============================================================
// REPAIR SERVICE
// ============================================================

type PeerData = Arc<DashMap<String, String>>;

async fn mock_keys(Extension(data): Extension<PeerData>) -> Json<Vec<KeyValue>> {
    Json(
        data.iter()
            .map(|entry| KeyValue {
                key: entry.key().clone(),
                value: entry.value().clone(),
            })
            .collect(),
    )
}

async fn mock_get(
    Extension(data): Extension<PeerData>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>, StatusCode> {
    data.get(&key)
        .map(|value| Json(ValueResponse {
            value: value.clone(),
        }))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn spawn_peer(data: PeerData) -> String {
    let app = Router::new()
        .route("/keys", get(mock_keys))
        .route("/internal/get/:key", get(mock_get))
        .layer(Extension(data));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

#[tokio::test]
async fn sync_pulls_keys_this_node_is_missing() {
    let remote: PeerData = Arc::new(DashMap::new());
    remote.insert("k1".to_string(), "v1".to_string());
    remote.insert("k3".to_string(), "v3".to_string());
    let peer = spawn_peer(remote).await;

    let store = Arc::new(MemoryStore::new());
    store.set("k1", "v1").unwrap();
    store.set("k2", "v2").unwrap();

    let service = RepairService::new(store.clone(), Duration::from_secs(60));
    let repaired = service.sync_with_node(&peer).await.unwrap();

    assert_eq!(repaired, 1);
    assert_eq!(store.get("k3").unwrap(), "v3");
    // Local-only keys are untouched; pushing them is the peer's own repair.
    assert_eq!(store.get("k2").unwrap(), "v2");
}

#[tokio::test]
async fn sync_with_identical_peer_repairs_nothing() {
    let remote: PeerData = Arc::new(DashMap::new());
    remote.insert("k1".to_string(), "v1".to_string());
    let peer = spawn_peer(remote).await;

    let store = Arc::new(MemoryStore::new());
    store.set("k1", "v1").unwrap();

    let service = RepairService::new(store, Duration::from_secs(60));
    assert_eq!(service.sync_with_node(&peer).await.unwrap(), 0);
}

#[tokio::test]
async fn local_tree_reflects_the_store() {
    let store = Arc::new(MemoryStore::new());
    store.set("a", "1").unwrap();
    store.set("b", "2").unwrap();

    let service = RepairService::new(store.clone(), Duration::from_secs(60));
    let tree = service.local_tree().unwrap();
    assert_eq!(tree.leaf_count(), 2);

    // Same key set, same root, regardless of which store produced it.
    let expected = MerkleTree::build(vec!["a".into(), "b".into()]);
    assert_eq!(tree.root_hash(), expected.root_hash());
}

#[tokio::test]
async fn repair_key_overwrites_locally() {
    let store = Arc::new(MemoryStore::new());
    store.set("k", "stale").unwrap();

    let service = RepairService::new(store.clone(), Duration::from_secs(60));
    service.repair_key("k", "good").unwrap();

    assert_eq!(store.get("k").unwrap(), "good");
}
