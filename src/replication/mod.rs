//! Replication Engine
//!
//! Fans writes out to peer nodes and keeps the cluster converging when peers
//! misbehave.
//!
//! ## Core Mechanisms
//! - **Quorum writes**: `Replicator` pushes every set to all peers and
//!   succeeds once `⌊N/2⌋+1` acknowledge; deletes are fire-and-forget by
//!   design, preferring availability over durability.
//! - **Hinted handoff**: a failed peer write becomes a persistent hint that a
//!   background worker retries until delivery or the attempt cap.
//! - **Read-your-writes**: `ConsistencyManager` remembers which peer last
//!   acknowledged a client's write and steers that client's reads there.

pub mod consistency;
pub mod hints;
pub mod protocol;
pub mod replicator;


use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("write quorum not reached: {got}/{need}")]
    QuorumNotReached { got: usize, need: usize },

    #[error("replication to {node} failed: {reason}")]
    ReplicationFailed { node: String, reason: String },

    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("key not found on any quorum of peers")]
    NotFound,
}
