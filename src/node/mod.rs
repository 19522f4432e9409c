//! Node Engine
//!
//! Ties the storage stack, replication engine and cluster subsystems into
//! one node and exposes them over HTTP.
//!
//! - **`engine`**: builds everything from the config and owns the write and
//!   read paths (gate check, local mutation, replica fan-out, remote
//!   fallback with read repair).
//! - **`handlers`**: axum handlers for the public surface and the internal
//!   peer-to-peer endpoints.
//! - **`protocol`**: request/response bodies for the public surface.

pub mod engine;
pub mod handlers;
pub mod protocol;


use thiserror::Error;

use crate::replication::ReplicationError;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),
}
