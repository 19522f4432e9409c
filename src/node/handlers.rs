//! HTTP Handlers
//!
//! Translates HTTP requests into node engine calls. The `/internal/*`
//! handlers form the closed wire contract between peers and always act on
//! the local stack, bypassing the write gate; the public handlers go
//! through the engine's full write/read paths.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::replication::protocol::{ReplicationRequest, ValueResponse};
use crate::storage::{KeyValue, StoreError};

use super::engine::NodeEngine;
use super::protocol::*;
use super::NodeError;

const CLIENT_ID_HEADER: &str = "x-client-id";

fn client_id(headers: &HeaderMap) -> String {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

fn write_error_status(e: &NodeError) -> StatusCode {
    match e {
        NodeError::Store(StoreError::ReadOnly) => StatusCode::SERVICE_UNAVAILABLE,
        NodeError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        NodeError::Replication(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// --- Internal wire contract ---

/// POST /internal/set — unconditional local set; 201 on success.
pub async fn handle_internal_set(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Json(req): Json<ReplicationRequest>,
) -> (StatusCode, Json<StatusResponse>) {
    match engine.stack.store.set(&req.key, &req.value) {
        Ok(()) => (StatusCode::CREATED, Json(StatusResponse::ok())),
        Err(e) => {
            tracing::error!("Internal set of {} failed: {}", req.key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::error(e.to_string())),
            )
        }
    }
}

/// DELETE /internal/delete/{key} — unconditional local delete; 200 whether
/// the key existed or not.
pub async fn handle_internal_delete(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<StatusResponse>) {
    match engine.stack.store.delete(&key) {
        Ok(()) | Err(StoreError::NotFound) => (StatusCode::OK, Json(StatusResponse::ok())),
        Err(e) => {
            tracing::error!("Internal delete of {} failed: {}", key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::error(e.to_string())),
            )
        }
    }
}

/// GET /internal/get/{key} — local read; 200 with the value or 404.
pub async fn handle_internal_get(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>, StatusCode> {
    match engine.stack.store.get(&key) {
        Ok(value) => Ok(Json(ValueResponse { value })),
        Err(StoreError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Internal get of {} failed: {}", key, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /health — 200 whenever the node can service reads.
pub async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// --- Public surface ---

pub async fn handle_set(
    Extension(engine): Extension<Arc<NodeEngine>>,
    headers: HeaderMap,
    Json(req): Json<SetRequest>,
) -> (StatusCode, Json<StatusResponse>) {
    if req.key.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("empty key")),
        );
    }

    match engine.set(&req.key, &req.value, &client_id(&headers)).await {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::ok())),
        Err(e) => (write_error_status(&e), Json(StatusResponse::error(e.to_string()))),
    }
}

pub async fn handle_get(
    Extension(engine): Extension<Arc<NodeEngine>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>, StatusCode> {
    match engine.get(&key, &client_id(&headers)).await {
        Ok(value) => Ok(Json(ValueResponse { value })),
        Err(NodeError::Store(StoreError::NotFound)) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Get of {} failed: {}", key, e);
            Err(write_error_status(&e))
        }
    }
}

pub async fn handle_delete(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<StatusResponse>) {
    match engine.delete(&key) {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::ok())),
        Err(e) => (write_error_status(&e), Json(StatusResponse::error(e.to_string()))),
    }
}

pub async fn handle_keys(
    Extension(engine): Extension<Arc<NodeEngine>>,
) -> Result<Json<Vec<KeyValue>>, StatusCode> {
    match engine.list_all() {
        Ok(items) => Ok(Json(items)),
        Err(e) => {
            tracing::error!("Key listing failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// --- Advanced operations ---

pub async fn handle_ttl_set(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Json(req): Json<TtlSetRequest>,
) -> (StatusCode, Json<StatusResponse>) {
    let Some(ttl) = engine.stack.ttl.as_ref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("TTL support is not enabled")),
        );
    };

    if !engine.role.can_write() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusResponse::error(StoreError::ReadOnly.to_string())),
        );
    }

    match ttl.set_with_ttl(&req.key, &req.value, Duration::from_secs(req.ttl_secs)) {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::ok())),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(e.to_string())),
        ),
    }
}

pub async fn handle_increment(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Json(req): Json<IncrementRequest>,
) -> Result<Json<IncrementResponse>, (StatusCode, Json<StatusResponse>)> {
    let Some(atomic) = engine.stack.atomic.as_ref() else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("atomic operations are not enabled")),
        ));
    };

    if !engine.role.can_write() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusResponse::error(StoreError::ReadOnly.to_string())),
        ));
    }

    match atomic.increment(&req.key, req.delta) {
        Ok(value) => Ok(Json(IncrementResponse { value })),
        Err(e @ StoreError::InvalidType(_)) => Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error(e.to_string())),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(e.to_string())),
        )),
    }
}

pub async fn handle_batch(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, (StatusCode, Json<StatusResponse>)> {
    let Some(batch) = engine.stack.batch.as_ref() else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("batch operations are not enabled")),
        ));
    };

    if !engine.role.can_write() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusResponse::error(StoreError::ReadOnly.to_string())),
        ));
    }

    Ok(Json(BatchResponse {
        results: batch.execute_batch(&req.operations),
    }))
}

pub async fn handle_cas(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Json(req): Json<CasRequest>,
) -> Result<Json<crate::storage::cas::CasResult>, (StatusCode, Json<StatusResponse>)> {
    let Some(cas) = engine.stack.cas.as_ref() else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("CAS support is not enabled")),
        ));
    };

    if !engine.role.can_write() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusResponse::error(StoreError::ReadOnly.to_string())),
        ));
    }

    match cas.compare_and_set(&req.key, &req.expected, &req.new_value, req.expected_version) {
        Ok(result) => Ok(Json(result)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(e.to_string())),
        )),
    }
}

pub async fn handle_acquire_lock(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path(key): Path<String>,
    Json(req): Json<LockRequest>,
) -> Result<Json<LockResponse>, (StatusCode, Json<StatusResponse>)> {
    let Some(cas) = engine.stack.cas.as_ref() else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("locking is not enabled")),
        ));
    };

    match cas.acquire_lock(&key, Duration::from_secs(req.ttl_secs)) {
        Ok(acquired) => Ok(Json(LockResponse { acquired })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(e.to_string())),
        )),
    }
}

pub async fn handle_release_lock(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<StatusResponse>) {
    let Some(cas) = engine.stack.cas.as_ref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("locking is not enabled")),
        );
    };

    match cas.release_lock(&key) {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::ok())),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(e.to_string())),
        ),
    }
}

pub async fn handle_cache_preload(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Json(req): Json<PreloadRequest>,
) -> (StatusCode, Json<StatusResponse>) {
    let Some(cache) = engine.stack.cache.as_ref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("caching is not enabled")),
        );
    };

    cache.preload(&req.keys);
    (StatusCode::OK, Json(StatusResponse::ok()))
}

pub async fn handle_performance_stats(
    Extension(engine): Extension<Arc<NodeEngine>>,
) -> Json<PerformanceStats> {
    let mut stats = PerformanceStats::default();

    if let Some(cache) = &engine.stack.cache {
        stats.cache = Some(cache.stats());
        stats.cache_hit_rate = Some(cache.hit_rate());
    }
    if let Some(bloom) = &engine.stack.bloom {
        stats.bloom = Some(bloom.filter_stats());
    }
    if let Some(compression) = &engine.stack.compression {
        stats.compression = Some(compression.stats());
    }

    Json(stats)
}

// --- Admin surface ---

pub async fn handle_list_nodes(
    Extension(engine): Extension<Arc<NodeEngine>>,
) -> Json<ClusterStatusResponse> {
    let nodes = engine
        .failover
        .node_status()
        .into_values()
        .map(|status| NodeStatusEntry {
            url: status.url,
            online: status.online,
            latency_ms: status.latency.as_millis() as u64,
        })
        .collect();

    Json(ClusterStatusResponse {
        role: engine.role(),
        active_nodes: engine.role.active_nodes(),
        quorum_size: engine.role.quorum_size(),
        nodes,
    })
}

pub async fn handle_add_node(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Json(req): Json<AddNodeRequest>,
) -> (StatusCode, Json<StatusResponse>) {
    engine.failover.add_node(&req.node);
    engine.replicator.update_nodes(engine.failover.nodes());
    tracing::info!("Added node {}", req.node);

    (StatusCode::OK, Json(StatusResponse::ok()))
}

pub async fn handle_remove_node(
    Extension(engine): Extension<Arc<NodeEngine>>,
    Path(node): Path<String>,
) -> (StatusCode, Json<StatusResponse>) {
    engine.failover.remove_node(&node);
    engine.replicator.update_nodes(engine.failover.nodes());
    tracing::info!("Removed node {}", node);

    (StatusCode::OK, Json(StatusResponse::ok()))
}

pub async fn handle_rebalance(
    Extension(engine): Extension<Arc<NodeEngine>>,
) -> Result<Json<RebalanceResponse>, (StatusCode, Json<StatusResponse>)> {
    match engine.rebalancer.trigger_rebalance().await {
        Ok(moved) => Ok(Json(RebalanceResponse { moved })),
        Err(e) => Err((
            StatusCode::CONFLICT,
            Json(StatusResponse::error(e.to_string())),
        )),
    }
}
