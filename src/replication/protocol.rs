//! Intra-cluster Wire Protocol
//!
//! Endpoint paths and Data Transfer Objects for node-to-node HTTP calls.
//! These four routes are the closed wire contract between peers; every body
//! is JSON and must stay byte-compatible across nodes.

use serde::{Deserialize, Serialize};

/// Unconditional local set on the receiving node; 201 on success.
pub const ENDPOINT_INTERNAL_SET: &str = "/internal/set";
/// Unconditional local delete; 200 whether the key existed or not.
pub const ENDPOINT_INTERNAL_DELETE: &str = "/internal/delete";
/// Local read, bypassing any routing; 200 with a value or 404.
pub const ENDPOINT_INTERNAL_GET: &str = "/internal/get";
/// Liveness probe; 200 when the node can service reads.
pub const ENDPOINT_HEALTH: &str = "/health";

/// Body of a peer-to-peer set (replication, hint delivery, rebalance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationRequest {
    pub key: String,
    pub value: String,
}

/// Body of a successful internal get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueResponse {
    pub value: String,
}

pub fn internal_set_url(node: &str) -> String {
    format!("http://{}{}", node, ENDPOINT_INTERNAL_SET)
}

pub fn internal_delete_url(node: &str, key: &str) -> String {
    format!("http://{}{}/{}", node, ENDPOINT_INTERNAL_DELETE, key)
}

pub fn internal_get_url(node: &str, key: &str) -> String {
    format!("http://{}{}/{}", node, ENDPOINT_INTERNAL_GET, key)
}

pub fn health_url(node: &str) -> String {
    format!("http://{}{}", node, ENDPOINT_HEALTH)
}
