//! Public API Protocol
//!
//! Request and response bodies for the node's public HTTP surface. The
//! peer-to-peer bodies live in `replication::protocol`; these shapes only
//! face clients and admins.

use serde::{Deserialize, Serialize};

use crate::storage::batch::{BatchOp, BatchOpResult};
use crate::storage::bloom::BloomStats;
use crate::storage::cache::CacheStats;
use crate::storage::compression::CompressionStats;

#[derive(Debug, Serialize, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Body of `POST /advanced/ttl`: a set whose key expires after `ttl_secs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TtlSetRequest {
    pub key: String,
    pub value: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncrementRequest {
    pub key: String,
    #[serde(default = "default_delta")]
    pub delta: i64,
}

fn default_delta() -> i64 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncrementResponse {
    pub value: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchRequest {
    pub operations: Vec<BatchOp>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchOpResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CasRequest {
    pub key: String,
    #[serde(default)]
    pub expected: String,
    pub new_value: String,
    #[serde(default)]
    pub expected_version: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockRequest {
    pub ttl_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockResponse {
    pub acquired: bool,
}

/// Body of `POST /advanced/cache/preload`: hot keys to warm from the
/// inner store.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreloadRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct PerformanceStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bloom: Option<BloomStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionStats>,
}

#[derive(Debug, Serialize)]
pub struct NodeStatusEntry {
    pub url: String,
    pub online: bool,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ClusterStatusResponse {
    pub role: crate::cluster::readonly::NodeRole,
    pub active_nodes: usize,
    pub quorum_size: usize,
    pub nodes: Vec<NodeStatusEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddNodeRequest {
    pub node: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RebalanceResponse {
    pub moved: usize,
}
