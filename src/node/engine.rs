use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::cross_dc::CrossDcSelector;
use crate::cluster::failover::FailoverMonitor;
use crate::cluster::readonly::{NodeRole, RoleManager};
use crate::cluster::rebalancer::{NodeLister, Rebalancer};
use crate::config::{Config, ConflictResolution};
use crate::repair::service::RepairService;
use crate::replication::hints::HintedHandoff;
use crate::replication::replicator::{QuorumConfig, Replicator};
use crate::replication::ReplicationError;
use crate::storage::builder::{StoreBuilder, StoreStack};
use crate::storage::cache::CacheStrategy;
use crate::storage::compression::Codec;
use crate::storage::disk::DiskStore;
use crate::storage::memory::MemoryStore;
use crate::storage::version::{ConflictResolver, ResolutionMode};
use crate::storage::{KeyValue, Store, StoreError};

use super::NodeError;

struct MonitorTopology(Arc<FailoverMonitor>);

impl NodeLister for MonitorTopology {
    fn nodes(&self) -> Vec<String> {
        self.0.nodes()
    }
}

/// One node of the cluster: the composed storage stack plus the replication
/// and membership machinery around it.
pub struct NodeEngine {
    pub stack: StoreStack,
    pub replicator: Arc<Replicator>,
    pub role: Arc<RoleManager>,
    pub failover: Arc<FailoverMonitor>,
    pub rebalancer: Arc<Rebalancer>,
    pub repair: Arc<RepairService>,
    pub cross_dc: Option<Arc<CrossDcSelector>>,
    strict_quorum: bool,
    check_interval: Duration,
}

impl NodeEngine {
    pub fn from_config(config: &Config) -> anyhow::Result<Arc<Self>> {
        let base: Arc<dyn Store> = if config.data_dir.is_empty() {
            tracing::info!("Using in-memory storage");
            Arc::new(MemoryStore::new())
        } else {
            tracing::info!("Using disk storage at {}", config.data_dir);
            Arc::new(DiskStore::open(PathBuf::from(&config.data_dir).as_path())?)
        };

        let mut builder = StoreBuilder::new(base);

        if config.advanced.ttl_enabled {
            builder =
                builder.with_ttl(Duration::from_secs(config.advanced.cleanup_interval.max(1)));
        }
        if config.performance.enabled {
            if config.performance.cache_size > 0 {
                builder = builder.with_cache(
                    CacheStrategy::Lru,
                    config.performance.cache_size,
                    Duration::from_secs(config.performance.cache_ttl.max(1)),
                );
            }
            if config.performance.compression_enabled {
                builder = builder
                    .with_compression(Codec::Gzip, config.performance.compression_threshold);
            }
            if config.performance.bloom_filter_enabled {
                builder = builder.with_bloom_filter(config.performance.expected_elements);
            }
            if config.performance.wal_enabled && !config.data_dir.is_empty() {
                builder = builder.with_wal(PathBuf::from(&config.data_dir));
            }
        }
        if config.advanced.atomic_enabled {
            builder = builder.with_atomic();
        }
        if config.advanced.batch_enabled {
            builder = builder.with_batch();
        }
        if config.advanced.cas_enabled || config.advanced.locking_enabled {
            builder = builder.with_cas();
        }

        let stack = builder.build()?;

        let peer_count = config.nodes.len();
        let quorum = if peer_count > 1 {
            let mut q = QuorumConfig::majority(peer_count);
            if config.replication.write_quorum > 0 {
                q.write_quorum = config.replication.write_quorum;
            }
            if config.replication.read_quorum > 0 {
                q.read_quorum = config.replication.read_quorum;
            }
            Some(q)
        } else {
            None
        };

        let hints = (config.replication.hinted_handoff_enabled && peer_count > 0).then(|| {
            let dir = if config.data_dir.is_empty() {
                PathBuf::from("hints")
            } else {
                PathBuf::from(&config.data_dir).join("hints")
            };
            Arc::new(HintedHandoff::new(dir))
        });

        let resolution_mode = match config.replication.conflict_resolution {
            ConflictResolution::Lww => ResolutionMode::Lww,
            ConflictResolution::Vector => ResolutionMode::VectorClock,
        };
        let node_id = uuid::Uuid::new_v4().to_string();
        let replicator = Arc::new(
            Replicator::new(config.nodes.clone(), config.replica_count, quorum, hints)
                .with_resolver(ConflictResolver::new(node_id).with_mode(resolution_mode)),
        );

        let check_interval = Duration::from_secs(config.failover.check_interval.max(1));
        let failover = Arc::new(FailoverMonitor::new(
            config.nodes.clone(),
            check_interval,
            Duration::from_secs(config.failover.timeout.max(1)),
        ));

        let quorum_size = quorum.map(|q| q.write_quorum).unwrap_or(0);
        let role = Arc::new(RoleManager::new(quorum_size));
        // Before the first probe pass every configured peer counts as active.
        role.update_active(peer_count);

        let self_addr = format!("localhost:{}", config.http_port);
        let rebalancer = Arc::new(Rebalancer::new(
            stack.store.clone(),
            Arc::new(MonitorTopology(failover.clone())),
            self_addr,
            role.clone(),
        ));

        let repair = Arc::new(RepairService::new(
            stack.store.clone(),
            Duration::from_secs(config.repair.sync_interval.max(1)),
        ));

        let cross_dc = config
            .multi_cloud
            .clone()
            .map(|mc| Arc::new(CrossDcSelector::new(mc)));

        Ok(Arc::new(Self {
            stack,
            replicator,
            role,
            failover,
            rebalancer,
            repair,
            cross_dc,
            strict_quorum: config.replication.strict_quorum,
            check_interval,
        }))
    }

    /// Starts every background worker: TTL sweeper, hint retries, health
    /// probes with quorum gating, anti-entropy snapshots and session
    /// cleanup.
    pub fn spawn_background(self: &Arc<Self>) {
        self.stack.spawn_background();

        if let Some(hints) = self.replicator.hints() {
            hints.spawn_retry_worker();
        }

        self.failover.spawn_probe_loop();
        self.repair.spawn();
        self.replicator.consistency().spawn_cleanup();

        // Feed probe results into the read-only gate.
        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(engine.check_interval);
            loop {
                interval.tick().await;
                let active = engine.failover.active_nodes().len();
                engine.role.update_active(active);
            }
        });
    }

    /// Write path: gate check, local mutation, then replica fan-out. In
    /// strict quorum mode a missed quorum fails the request; otherwise
    /// replication runs in the background and failures become hints.
    pub async fn set(&self, key: &str, value: &str, client_id: &str) -> Result<(), NodeError> {
        if !self.role.can_write() {
            return Err(StoreError::ReadOnly.into());
        }

        self.stack.store.set(key, value)?;
        self.replicator.consistency().touch_session(client_id);

        if self.strict_quorum {
            self.replicator.replicate_set(key, value).await?;
            return Ok(());
        }

        let replicator = self.replicator.clone();
        let key = key.to_string();
        let value = value.to_string();
        tokio::spawn(async move {
            if let Err(e) = replicator.replicate_set(&key, &value).await {
                tracing::warn!("Replication of {} fell short: {}", key, e);
            }
        });

        Ok(())
    }

    /// Read path: the local stack first, then a consistency-aware remote
    /// read. A remotely found value is written back locally (read repair).
    pub async fn get(&self, key: &str, client_id: &str) -> Result<String, NodeError> {
        match self.stack.store.get(key) {
            Ok(value) => return Ok(value),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        if self.replicator.nodes().is_empty() {
            return Err(StoreError::NotFound.into());
        }

        match self.replicator.get_with_consistency(key, client_id).await {
            Ok(value) => {
                if let Err(e) = self.stack.store.set(key, &value) {
                    tracing::warn!("Read repair of {} failed: {}", key, e);
                }
                Ok(value)
            }
            Err(ReplicationError::NotFound) => Err(StoreError::NotFound.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete path: gate check, local delete, fire-and-forget peer fan-out.
    pub fn delete(&self, key: &str) -> Result<(), NodeError> {
        if !self.role.can_write() {
            return Err(StoreError::ReadOnly.into());
        }

        let local = self.stack.store.delete(key);
        self.replicator.replicate_delete(key);

        local.map_err(NodeError::from)
    }

    pub fn list_all(&self) -> Result<Vec<KeyValue>, NodeError> {
        self.stack.store.list_all().map_err(NodeError::from)
    }

    pub fn role(&self) -> NodeRole {
        self.role.role()
    }

    pub fn close(&self) -> Result<(), StoreError> {
        self.repair.stop();
        self.stack.store.close()
    }
}
