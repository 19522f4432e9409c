use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinSet;

use super::consistency::ConsistencyManager;
use super::hints::HintedHandoff;
use super::protocol::{
    internal_delete_url, internal_get_url, internal_set_url, ReplicationRequest, ValueResponse,
};
use super::ReplicationError;
use crate::storage::version::ConflictResolver;

const SET_TIMEOUT: Duration = Duration::from_secs(2);
const GET_TIMEOUT: Duration = Duration::from_secs(2);
const DELETE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct QuorumConfig {
    pub write_quorum: usize,
    pub read_quorum: usize,
    pub total_nodes: usize,
}

impl QuorumConfig {
    /// Majority quorum for `n` peers: `⌊n/2⌋ + 1` for both reads and writes.
    pub fn majority(n: usize) -> Self {
        Self {
            write_quorum: n / 2 + 1,
            read_quorum: n / 2 + 1,
            total_nodes: n,
        }
    }
}

struct PeerSet {
    nodes: Vec<String>,
    replica_count: usize,
}

/// Fans writes out to the peer list and reads back with quorum agreement.
///
/// Failed peer writes turn into hints instead of failing the caller; the
/// consistency manager learns which peer acknowledged each write so
/// subsequent reads from the same client can stick to it.
pub struct Replicator {
    peers: RwLock<PeerSet>,
    quorum: Option<QuorumConfig>,
    consistency: Arc<ConsistencyManager>,
    hints: Option<Arc<HintedHandoff>>,
    resolver: ConflictResolver,
    client: reqwest::Client,
}

impl Replicator {
    pub fn new(
        nodes: Vec<String>,
        replica_count: usize,
        quorum: Option<QuorumConfig>,
        hints: Option<Arc<HintedHandoff>>,
    ) -> Self {
        let replica_count = replica_count.clamp(1, nodes.len().max(1));

        Self {
            peers: RwLock::new(PeerSet {
                nodes,
                replica_count,
            }),
            quorum,
            consistency: Arc::new(ConsistencyManager::new()),
            hints,
            resolver: ConflictResolver::new(uuid::Uuid::new_v4().to_string()),
            client: reqwest::Client::new(),
        }
    }

    /// Swaps in a resolver carrying a specific node identity or resolution
    /// mode.
    pub fn with_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn consistency(&self) -> Arc<ConsistencyManager> {
        self.consistency.clone()
    }

    /// This node's identity in vector clocks and the resolver merging
    /// divergent versions on its behalf.
    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn hints(&self) -> Option<Arc<HintedHandoff>> {
        self.hints.clone()
    }

    pub fn quorum(&self) -> Option<QuorumConfig> {
        self.quorum
    }

    pub fn nodes(&self) -> Vec<String> {
        self.peers.read().nodes.clone()
    }

    pub fn replica_count(&self) -> usize {
        self.peers.read().replica_count
    }

    pub fn set_replica_count(&self, count: usize) {
        let mut peers = self.peers.write();
        peers.replica_count = count.clamp(1, peers.nodes.len().max(1));
    }

    /// Replaces the peer list, shrinking the replica count when it no longer
    /// fits.
    pub fn update_nodes(&self, nodes: Vec<String>) {
        let mut peers = self.peers.write();
        peers.replica_count = peers.replica_count.min(nodes.len()).max(1);
        peers.nodes = nodes;
    }

    /// How many peer acknowledgments a write needs.
    fn required_acks(&self, peer_count: usize) -> usize {
        match self.quorum {
            Some(q) => q.write_quorum,
            None => self.peers.read().replica_count.min(peer_count),
        }
    }

    /// Pushes a set to every peer concurrently. Peers that fail get a hint;
    /// peers that succeed are recorded for read-your-writes. Errors with
    /// `QuorumNotReached` when too few acknowledged.
    pub async fn replicate_set(&self, key: &str, value: &str) -> Result<usize, ReplicationError> {
        // Snapshot under the read lock so a concurrent update_nodes never
        // yields a half-updated view.
        let nodes = self.nodes();
        if nodes.is_empty() {
            return Ok(0);
        }

        let mut tasks = JoinSet::new();
        for node in nodes.iter().cloned() {
            let client = self.client.clone();
            let body = ReplicationRequest {
                key: key.to_string(),
                value: value.to_string(),
            };
            tasks.spawn(async move {
                let result = send_set(&client, &node, &body, SET_TIMEOUT).await;
                (node, result)
            });
        }

        let mut successes = 0;
        while let Some(joined) = tasks.join_next().await {
            let Ok((node, result)) = joined else {
                continue;
            };

            match result {
                Ok(()) => {
                    successes += 1;
                    self.consistency.record_write(key, &node);
                }
                Err(e) => {
                    tracing::warn!("Replication of {} to {} failed: {}", key, node, e);
                    if let Some(hints) = &self.hints {
                        hints.store_hint(key, value, &node);
                    }
                }
            }
        }

        let need = self.required_acks(nodes.len());
        if successes < need {
            return Err(ReplicationError::QuorumNotReached {
                got: successes,
                need,
            });
        }

        Ok(successes)
    }

    /// Fire-and-forget delete fan-out: returns immediately, the outcome is
    /// only logged. Deletes intentionally prefer availability over
    /// durability.
    pub fn replicate_delete(&self, key: &str) {
        let nodes = self.nodes();
        if nodes.is_empty() {
            return;
        }

        let client = self.client.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            for node in nodes {
                let client = client.clone();
                let key = key.clone();
                tasks.spawn(async move {
                    let result = send_delete(&client, &node, &key).await;
                    (node, result)
                });
            }

            let mut successes = 0;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(()))) => successes += 1,
                    Ok((node, Err(e))) => {
                        tracing::warn!("Delete replication of {} to {} failed: {}", key, node, e);
                    }
                    Err(_) => {}
                }
            }

            tracing::debug!("Delete of {} acknowledged by {} peers", key, successes);
        });
    }

    /// Read honoring read-your-writes: a client that recently wrote is
    /// steered to the acknowledging peer, everyone else gets a quorum read.
    pub async fn get_with_consistency(
        &self,
        key: &str,
        client_id: &str,
    ) -> Result<String, ReplicationError> {
        if let Some(preferred) = self.consistency.preferred_node(client_id, key) {
            match self.read_from_node(&preferred, key).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!("Sticky read from {} failed: {}", preferred, e);
                }
            }
        }

        self.read_with_quorum(key).await
    }

    /// Concurrent read from all peers; the first value seen by at least
    /// `read_quorum` responders wins.
    pub async fn read_with_quorum(&self, key: &str) -> Result<String, ReplicationError> {
        let nodes = self.nodes();
        if nodes.is_empty() {
            return Err(ReplicationError::NotFound);
        }

        let need = self.quorum.map(|q| q.read_quorum).unwrap_or(1);

        let mut tasks = JoinSet::new();
        for node in nodes {
            let client = self.client.clone();
            let key = key.to_string();
            tasks.spawn(async move { read_value(&client, &node, &key).await });
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let Ok(Ok(value)) = joined else {
                continue;
            };

            let seen = counts.entry(value.clone()).or_insert(0);
            *seen += 1;
            if *seen >= need {
                return Ok(value);
            }
        }

        Err(ReplicationError::QuorumNotReached { got: 0, need })
    }

    pub async fn read_from_node(&self, node: &str, key: &str) -> Result<String, ReplicationError> {
        read_value(&self.client, node, key).await
    }
}

async fn send_set(
    client: &reqwest::Client,
    node: &str,
    body: &ReplicationRequest,
    timeout: Duration,
) -> Result<(), ReplicationError> {
    let response = client
        .post(internal_set_url(node))
        .json(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ReplicationError::ReplicationFailed {
            node: node.to_string(),
            reason: e.to_string(),
        })?;

    if response.status().is_server_error() || response.status().is_client_error() {
        return Err(ReplicationError::ReplicationFailed {
            node: node.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    Ok(())
}

async fn send_delete(
    client: &reqwest::Client,
    node: &str,
    key: &str,
) -> Result<(), ReplicationError> {
    let response = client
        .delete(internal_delete_url(node, key))
        .timeout(DELETE_TIMEOUT)
        .send()
        .await
        .map_err(|e| ReplicationError::ReplicationFailed {
            node: node.to_string(),
            reason: e.to_string(),
        })?;

    if response.status().is_server_error() || response.status().is_client_error() {
        return Err(ReplicationError::ReplicationFailed {
            node: node.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    Ok(())
}

async fn read_value(
    client: &reqwest::Client,
    node: &str,
    key: &str,
) -> Result<String, ReplicationError> {
    let response = client
        .get(internal_get_url(node, key))
        .timeout(GET_TIMEOUT)
        .send()
        .await
        .map_err(|e| ReplicationError::NodeUnavailable(format!("{}: {}", node, e)))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(ReplicationError::NotFound);
    }
    if !response.status().is_success() {
        return Err(ReplicationError::ReplicationFailed {
            node: node.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let body: ValueResponse =
        response
            .json()
            .await
            .map_err(|e| ReplicationError::ReplicationFailed {
                node: node.to_string(),
                reason: e.to_string(),
            })?;

    Ok(body.value)
}
