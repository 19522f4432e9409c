use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinSet;

use crate::config::{DataCenterConfig, EdgeNodeConfig, MultiCloudConfig};
use crate::replication::protocol::{internal_set_url, ReplicationRequest};

const BASE_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_TIMEOUT: Duration = Duration::from_secs(10);

/// A candidate node for a cross-datacenter write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationTarget {
    pub node: String,
    pub region: String,
    pub priority: u32,
    pub latency: Duration,
    pub is_edge: bool,
}

/// Picks replication targets across datacenters and edge nodes by priority
/// and observed latency, and writes to them with latency-scaled deadlines.
pub struct CrossDcSelector {
    data_centers: Vec<DataCenterConfig>,
    edge_nodes: Vec<EdgeNodeConfig>,
    latencies: RwLock<HashMap<String, Duration>>,
    client: reqwest::Client,
}

impl CrossDcSelector {
    pub fn new(config: MultiCloudConfig) -> Self {
        Self {
            data_centers: config.data_centers,
            edge_nodes: config.edge_nodes,
            latencies: RwLock::new(HashMap::new()),
            client: reqwest::Client::new(),
        }
    }

    /// All DC and edge nodes as candidates, sorted by priority ascending
    /// then latency ascending, truncated to `replica_count`. Edge nodes get
    /// the highest priority.
    pub fn select_targets(&self, replica_count: usize) -> Vec<ReplicationTarget> {
        let latencies = self.latencies.read();
        let mut targets = Vec::new();

        for dc in &self.data_centers {
            for node in &dc.nodes {
                let latency = latencies
                    .get(node)
                    .copied()
                    .unwrap_or(Duration::from_millis(dc.latency_ms));
                targets.push(ReplicationTarget {
                    node: node.clone(),
                    region: dc.region.clone(),
                    priority: dc.priority,
                    latency,
                    is_edge: false,
                });
            }
        }

        for edge in &self.edge_nodes {
            let latency = latencies
                .get(&edge.node)
                .copied()
                .unwrap_or(Duration::from_millis(edge.latency_ms));
            targets.push(ReplicationTarget {
                node: edge.node.clone(),
                region: edge.location.clone(),
                priority: 1,
                latency,
                is_edge: true,
            });
        }

        targets.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.latency.cmp(&b.latency))
        });
        targets.truncate(replica_count);

        targets
    }

    /// Deadline for one target: base plus twice its latency, capped.
    pub fn timeout_for(latency: Duration) -> Duration {
        (BASE_TIMEOUT + latency * 2).min(MAX_TIMEOUT)
    }

    /// Writes to every target concurrently; at least half must acknowledge.
    pub async fn replicate_to_targets(
        &self,
        key: &str,
        value: &str,
        targets: &[ReplicationTarget],
    ) -> anyhow::Result<usize> {
        if targets.is_empty() {
            return Ok(0);
        }

        let mut tasks = JoinSet::new();
        for target in targets {
            let client = self.client.clone();
            let node = target.node.clone();
            let timeout = Self::timeout_for(target.latency);
            let body = ReplicationRequest {
                key: key.to_string(),
                value: value.to_string(),
            };
            tasks.spawn(async move {
                let result = async {
                    let response = client
                        .post(internal_set_url(&node))
                        .json(&body)
                        .timeout(timeout)
                        .send()
                        .await?;
                    if !response.status().is_success() {
                        anyhow::bail!("HTTP {}", response.status());
                    }
                    Ok::<_, anyhow::Error>(())
                }
                .await;
                (node, result)
            });
        }

        let mut successes = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => successes += 1,
                Ok((node, Err(e))) => {
                    tracing::warn!("Cross-DC write to {} failed: {}", node, e);
                }
                Err(_) => {}
            }
        }

        if successes < targets.len() / 2 {
            anyhow::bail!(
                "cross-DC replication failed: only {}/{} targets acknowledged",
                successes,
                targets.len()
            );
        }

        Ok(successes)
    }

    pub fn update_latency(&self, node: &str, latency: Duration) {
        self.latencies.write().insert(node.to_string(), latency);
    }

    pub fn latency_metrics(&self) -> HashMap<String, Duration> {
        self.latencies.read().clone()
    }

    pub fn is_edge_node(&self, node: &str) -> bool {
        self.edge_nodes.iter().any(|edge| edge.node == node)
    }
}
