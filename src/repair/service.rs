use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::replication::protocol::{internal_get_url, ValueResponse};
use crate::storage::{KeyValue, Store};

use super::merkle::{compare_trees, MerkleTree};

const FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Background anti-entropy: periodically snapshots the local key set into a
/// Merkle tree, and on demand reconciles this node against a peer by diffing
/// trees and pulling the keys this node lacks.
pub struct RepairService {
    store: Arc<dyn Store>,
    sync_interval: Duration,
    running: AtomicBool,
    client: reqwest::Client,
}

impl RepairService {
    pub fn new(store: Arc<dyn Store>, sync_interval: Duration) -> Self {
        Self {
            store,
            sync_interval,
            running: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    pub fn local_tree(&self) -> anyhow::Result<MerkleTree> {
        let keys = self
            .store
            .list_all()?
            .into_iter()
            .map(|kv| kv.key)
            .collect();
        Ok(MerkleTree::build(keys))
    }

    /// Reconciles against `node`: fetches its key list, diffs the trees, and
    /// pulls every key present there but absent here. Returns the number of
    /// keys repaired.
    pub async fn sync_with_node(&self, node: &str) -> anyhow::Result<usize> {
        let remote_items = self.fetch_remote_keys(node).await?;
        let remote_keys: Vec<String> = remote_items.iter().map(|kv| kv.key.clone()).collect();

        let local_keys: HashSet<String> = self
            .store
            .list_all()?
            .into_iter()
            .map(|kv| kv.key)
            .collect();

        let local_tree = MerkleTree::build(local_keys.iter().cloned().collect());
        let remote_tree = MerkleTree::build(remote_keys.clone());

        let diffs = compare_trees(&local_tree, &remote_tree);
        if diffs.is_empty() {
            tracing::debug!("No divergence against {}", node);
            return Ok(0);
        }
        tracing::info!("{} divergent positions against {}", diffs.len(), node);

        let mut repaired = 0;
        for key in remote_keys {
            if local_keys.contains(&key) {
                continue;
            }

            match self.fetch_remote_value(node, &key).await {
                Ok(value) => {
                    self.store.set(&key, &value)?;
                    repaired += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to pull {} from {}: {}", key, node, e);
                }
            }
        }

        Ok(repaired)
    }

    /// Forcibly overwrites a key with a known-good value.
    pub fn repair_key(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.store.set(key, value)?;
        Ok(())
    }

    async fn fetch_remote_keys(&self, node: &str) -> anyhow::Result<Vec<KeyValue>> {
        let response = self
            .client
            .get(format!("http://{}/keys", node))
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("key listing from {} failed: HTTP {}", node, response.status());
        }

        Ok(response.json().await?)
    }

    async fn fetch_remote_value(&self, node: &str, key: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(internal_get_url(node, key))
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status());
        }

        let body: ValueResponse = response.json().await?;
        Ok(body.value)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Starts the periodic local-tree snapshot loop. Errors are logged and
    /// the loop continues.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.sync_interval);
            loop {
                interval.tick().await;
                if !service.running.load(Ordering::SeqCst) {
                    break;
                }

                match service.local_tree() {
                    Ok(tree) => {
                        tracing::debug!(
                            "Anti-entropy snapshot: {} keys, root {}",
                            tree.leaf_count(),
                            tree.root_hash()
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Anti-entropy snapshot failed: {}", e);
                    }
                }
            }
        })
    }
}
