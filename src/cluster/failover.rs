use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::task::JoinSet;

use crate::replication::protocol::health_url;

/// Health snapshot of one peer as seen from this node.
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub url: String,
    pub online: bool,
    pub last_seen: Option<Instant>,
    pub latency: Duration,
}

impl NodeStatus {
    fn assumed_online(url: &str) -> Self {
        Self {
            url: url.to_string(),
            online: true,
            last_seen: None,
            latency: Duration::ZERO,
        }
    }
}

struct MonitorState {
    nodes: Vec<String>,
    status: HashMap<String, NodeStatus>,
}

/// Probes every peer's `/health` on a fixed interval and keeps per-peer
/// status. New peers start out assumed online until the first probe says
/// otherwise.
pub struct FailoverMonitor {
    state: RwLock<MonitorState>,
    check_interval: Duration,
    timeout: Duration,
    client: reqwest::Client,
}

impl FailoverMonitor {
    pub fn new(nodes: Vec<String>, check_interval: Duration, timeout: Duration) -> Self {
        let status = nodes
            .iter()
            .map(|node| (node.clone(), NodeStatus::assumed_online(node)))
            .collect();

        Self {
            state: RwLock::new(MonitorState { nodes, status }),
            check_interval,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn active_nodes(&self) -> Vec<String> {
        self.state
            .read()
            .status
            .values()
            .filter(|status| status.online)
            .map(|status| status.url.clone())
            .collect()
    }

    pub fn node_status(&self) -> HashMap<String, NodeStatus> {
        self.state.read().status.clone()
    }

    pub fn nodes(&self) -> Vec<String> {
        self.state.read().nodes.clone()
    }

    pub fn add_node(&self, node: &str) {
        let mut state = self.state.write();
        if state.nodes.iter().any(|n| n == node) {
            return;
        }
        state.nodes.push(node.to_string());
        state
            .status
            .entry(node.to_string())
            .or_insert_with(|| NodeStatus::assumed_online(node));
    }

    pub fn remove_node(&self, node: &str) {
        let mut state = self.state.write();
        state.nodes.retain(|n| n != node);
        state.status.remove(node);
    }

    /// Replaces the peer list wholesale, keeping the known status of peers
    /// that survive the change.
    pub fn set_nodes(&self, nodes: Vec<String>) {
        let mut state = self.state.write();

        let mut status = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            let entry = state
                .status
                .remove(node)
                .unwrap_or_else(|| NodeStatus::assumed_online(node));
            status.insert(node.clone(), entry);
        }

        state.nodes = nodes;
        state.status = status;
    }

    /// Probes every peer once, concurrently. The node list is snapshotted
    /// under the read lock before fanning out.
    pub async fn check_all(&self) {
        let nodes = self.nodes();
        if nodes.is_empty() {
            return;
        }

        let mut probes = JoinSet::new();
        for node in nodes {
            let client = self.client.clone();
            let timeout = self.timeout;
            probes.spawn(async move {
                let started = Instant::now();
                let healthy = probe(&client, &node, timeout).await;
                (node, healthy, started.elapsed())
            });
        }

        while let Some(joined) = probes.join_next().await {
            let Ok((node, healthy, latency)) = joined else {
                continue;
            };
            self.record_probe(&node, healthy, latency);
        }
    }

    fn record_probe(&self, node: &str, online: bool, latency: Duration) {
        let mut state = self.state.write();
        if let Some(status) = state.status.get_mut(node) {
            let was_online = status.online;
            status.online = online;
            status.last_seen = Some(Instant::now());
            status.latency = latency;

            if was_online && !online {
                tracing::warn!("Peer {} went offline", node);
            } else if !was_online && online {
                tracing::info!("Peer {} is back online", node);
            }
        }
    }

    pub fn spawn_probe_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.check_interval);
            loop {
                interval.tick().await;
                monitor.check_all().await;
            }
        })
    }
}

async fn probe(client: &reqwest::Client, node: &str, timeout: Duration) -> bool {
    match client.get(health_url(node)).timeout(timeout).send().await {
        Ok(response) => response.status() == reqwest::StatusCode::OK,
        Err(_) => false,
    }
}
