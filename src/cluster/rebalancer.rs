use std::sync::Arc;
use std::time::Duration;

use crate::replication::protocol::{internal_set_url, ReplicationRequest};
use crate::storage::Store;

use super::readonly::RoleManager;

const SHIP_TIMEOUT: Duration = Duration::from_secs(3);

/// Minimal view of the cluster topology the rebalancer needs.
pub trait NodeLister: Send + Sync {
    fn nodes(&self) -> Vec<String>;
}

/// 32-bit FNV-1a; stable and fast, so every node derives the same owner for
/// the same key and node list.
pub fn fnv1a32(data: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for byte in data {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Owner of `key` among `sorted_nodes`: `fnv1a32(key) mod n`.
pub fn choose_owner<'a>(key: &str, sorted_nodes: &'a [String]) -> Option<&'a String> {
    if sorted_nodes.is_empty() {
        return None;
    }
    let idx = fnv1a32(key.as_bytes()) as usize % sorted_nodes.len();
    Some(&sorted_nodes[idx])
}

/// Ships misplaced keys to their consistent-hash owner when the topology
/// changes. A shipped key is deleted locally only after the owner
/// acknowledged it, so no key is ever lost mid-move.
pub struct Rebalancer {
    store: Arc<dyn Store>,
    topology: Arc<dyn NodeLister>,
    self_addr: String,
    role: Arc<RoleManager>,
    client: reqwest::Client,
}

impl Rebalancer {
    pub fn new(
        store: Arc<dyn Store>,
        topology: Arc<dyn NodeLister>,
        self_addr: impl Into<String>,
        role: Arc<RoleManager>,
    ) -> Self {
        Self {
            store,
            topology,
            self_addr: self_addr.into(),
            role,
            client: reqwest::Client::new(),
        }
    }

    /// Moves every local key whose owner is another node. Returns the number
    /// of keys moved.
    pub async fn trigger_rebalance(&self) -> anyhow::Result<usize> {
        if !self.role.begin_rebalance() {
            anyhow::bail!("rebalance already in progress");
        }

        let result = self.run().await;
        self.role.finish_rebalance();
        result
    }

    async fn run(&self) -> anyhow::Result<usize> {
        let mut nodes = self.topology.nodes();
        if !nodes.iter().any(|n| n == &self.self_addr) {
            nodes.push(self.self_addr.clone());
        }
        if nodes.len() < 2 {
            return Ok(0);
        }
        nodes.sort();

        let items = self.store.list_all()?;
        let mut moved = 0;

        for item in items {
            let owner = match choose_owner(&item.key, &nodes) {
                Some(owner) if owner != &self.self_addr => owner.clone(),
                _ => continue,
            };

            match self.ship(&owner, &item.key, &item.value).await {
                Ok(()) => {
                    if let Err(e) = self.store.delete(&item.key) {
                        tracing::warn!(
                            "Shipped {} to {} but local delete failed: {}",
                            item.key,
                            owner,
                            e
                        );
                    } else {
                        moved += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to ship {} to {}: {}", item.key, owner, e);
                }
            }
        }

        tracing::info!("Rebalance complete: {} keys moved", moved);
        Ok(moved)
    }

    async fn ship(&self, owner: &str, key: &str, value: &str) -> anyhow::Result<()> {
        let body = ReplicationRequest {
            key: key.to_string(),
            value: value.to_string(),
        };

        let response = self
            .client
            .post(internal_set_url(owner))
            .json(&body)
            .timeout(SHIP_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status());
        }

        Ok(())
    }
}
