//! Cluster Membership & Placement
//!
//! Tracks peer health and reacts to membership changes.
//!
//! ## Core Mechanisms
//! - **Failover monitoring**: periodic `/health` probes maintain per-peer
//!   online/latency status.
//! - **Read-only gating**: the node refuses writes whenever fewer peers than
//!   the configured quorum are active, and tracks the Normal / ReadOnly /
//!   Rebalancing role state machine.
//! - **Rebalancing**: consistent-hash ownership over the sorted node list;
//!   misplaced keys are shipped to their owner and deleted locally.
//! - **Cross-DC selection**: replication targets ordered by priority and
//!   observed latency when a multi-datacenter topology is configured.

pub mod cross_dc;
pub mod failover;
pub mod readonly;
pub mod rebalancer;
