//! Layered Storage Stack
//!
//! Implements the node-local storage engine as a chain of decorators around a
//! base string→string map.
//!
//! ## Core Concepts
//! - **Contract**: every layer implements the same `Store` trait, so capabilities
//!   compose freely and the rest of the node only sees `Arc<dyn Store>`.
//! - **Decorators**: TTL, cache, compression, Bloom filter, write-ahead log,
//!   atomic counters, batches and CAS/locks each wrap exactly one inner store
//!   and forward calls after applying their own policy.
//! - **Composition**: `builder::StoreBuilder` applies the layers in a fixed
//!   order and returns a `StoreStack` façade with typed handles, so callers
//!   never need to downcast the composed object.
//! - **Versioning**: `version` holds the vector clocks and conflict resolution
//!   used by the replication engine.

pub mod atomic;
pub mod batch;
pub mod bloom;
pub mod builder;
pub mod cache;
pub mod cas;
pub mod compression;
pub mod disk;
pub mod memory;
pub mod ttl;
pub mod version;
pub mod wal;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single key-value pair as stored locally and shipped between nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,

    #[error("key already exists")]
    KeyExists,

    #[error("value is not an integer: {0}")]
    InvalidType(String),

    #[error("node is read-only: insufficient quorum")]
    ReadOnly,

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// The contract every storage layer implements.
///
/// Composition is bottom-up: a decorator owns exactly one inner
/// `Arc<dyn Store>` and forwards calls after its own policy. `close` cascades
/// to the inner store and is idempotent.
pub trait Store: Send + Sync {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<String, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError>;
    fn close(&self) -> Result<(), StoreError>;
}
