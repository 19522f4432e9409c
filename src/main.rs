use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::{Extension, Router};

use distkv::config::Config;
use distkv::node::engine::NodeEngine;
use distkv::node::handlers::*;
use distkv::replication::protocol::{
    ENDPOINT_HEALTH, ENDPOINT_INTERNAL_DELETE, ENDPOINT_INTERNAL_GET, ENDPOINT_INTERNAL_SET,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config_path = std::env::args()
        .skip(1)
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    let config = match Config::load(&PathBuf::from(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Could not load {} ({}), using defaults", config_path, e);
            Config::default()
        }
    };

    tracing::info!(
        "Starting node on port {} with {} peer(s), replica count {}",
        config.http_port,
        config.nodes.len(),
        config.replica_count
    );

    let engine = NodeEngine::from_config(&config)?;
    engine.spawn_background();

    let app = Router::new()
        // Internal wire contract
        .route(ENDPOINT_INTERNAL_SET, post(handle_internal_set))
        .route(
            &format!("{}/:key", ENDPOINT_INTERNAL_DELETE),
            delete(handle_internal_delete),
        )
        .route(
            &format!("{}/:key", ENDPOINT_INTERNAL_GET),
            get(handle_internal_get),
        )
        .route(ENDPOINT_HEALTH, get(handle_health))
        // Public data surface
        .route("/set", post(handle_set))
        .route("/get/:key", get(handle_get))
        .route("/delete/:key", delete(handle_delete))
        .route("/keys", get(handle_keys))
        // Advanced operations
        .route("/advanced/ttl", post(handle_ttl_set))
        .route("/advanced/increment", post(handle_increment))
        .route("/advanced/batch", post(handle_batch))
        .route("/advanced/cas", post(handle_cas))
        .route(
            "/advanced/lock/:key",
            post(handle_acquire_lock).delete(handle_release_lock),
        )
        .route("/advanced/cache/preload", post(handle_cache_preload))
        .route("/advanced/performance/stats", get(handle_performance_stats))
        // Admin surface
        .route("/admin/nodes", get(handle_list_nodes).post(handle_add_node))
        .route("/admin/nodes/:node", delete(handle_remove_node))
        .route("/admin/rebalance", post(handle_rebalance))
        .layer(Extension(engine.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, closing storage stack");
    let closer = engine.clone();
    let closed = tokio::task::spawn_blocking(move || closer.close());
    match tokio::time::timeout(Duration::from_secs(5), closed).await {
        Ok(Ok(Ok(()))) => tracing::info!("Storage stack closed"),
        Ok(Ok(Err(e))) => tracing::error!("Storage close failed: {}", e),
        Ok(Err(e)) => tracing::error!("Storage close panicked: {}", e),
        Err(_) => tracing::error!("Storage close timed out after 5s"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
