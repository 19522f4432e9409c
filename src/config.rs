//! Node Configuration
//!
//! JSON config schema consumed by the core: the data directory, the peer
//! list and replica count, and the per-subsystem tuning sections. Every
//! section is optional and falls back to conservative defaults, so a
//! one-line `{"http_port": 8080}` file is a valid single-node setup.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http_port: u16,
    /// Empty means memory-only: no snapshot, WAL or hint persistence.
    pub data_dir: String,
    /// Peer addresses (`host:port`), excluding this node.
    pub nodes: Vec<String>,
    pub replica_count: usize,
    pub advanced: AdvancedConfig,
    pub performance: PerformanceConfig,
    pub replication: ReplicationConfig,
    pub failover: FailoverConfig,
    pub repair: RepairConfig,
    pub multi_cloud: Option<MultiCloudConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            data_dir: String::new(),
            nodes: Vec::new(),
            replica_count: 1,
            advanced: AdvancedConfig::default(),
            performance: PerformanceConfig::default(),
            replication: ReplicationConfig::default(),
            failover: FailoverConfig::default(),
            repair: RepairConfig::default(),
            multi_cloud: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub ttl_enabled: bool,
    pub atomic_enabled: bool,
    pub batch_enabled: bool,
    pub cas_enabled: bool,
    pub locking_enabled: bool,
    /// TTL sweeper period, seconds.
    pub cleanup_interval: u64,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            ttl_enabled: false,
            atomic_enabled: false,
            batch_enabled: false,
            cas_enabled: false,
            locking_enabled: false,
            cleanup_interval: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub enabled: bool,
    pub cache_size: usize,
    /// Soft TTL of cache entries, seconds.
    pub cache_ttl: u64,
    pub compression_enabled: bool,
    pub compression_threshold: usize,
    pub bloom_filter_enabled: bool,
    pub expected_elements: usize,
    pub wal_enabled: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_size: 0,
            cache_ttl: 300,
            compression_enabled: false,
            compression_threshold: 1024,
            bloom_filter_enabled: false,
            expected_elements: 10_000,
            wal_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    Lww,
    Vector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Zero means derive the majority quorum from the peer count.
    pub write_quorum: usize,
    pub read_quorum: usize,
    pub hinted_handoff_enabled: bool,
    pub conflict_resolution: ConflictResolution,
    /// When set, a write that misses its quorum is surfaced to the caller
    /// instead of being left to hinted handoff.
    pub strict_quorum: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            write_quorum: 0,
            read_quorum: 0,
            hinted_handoff_enabled: true,
            conflict_resolution: ConflictResolution::Lww,
            strict_quorum: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Probe period, seconds.
    pub check_interval: u64,
    /// Per-probe timeout, seconds.
    pub timeout: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            check_interval: 5,
            timeout: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Anti-entropy period, seconds.
    pub sync_interval: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self { sync_interval: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCenterConfig {
    pub region: String,
    pub priority: u32,
    pub latency_ms: u64,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeNodeConfig {
    pub node: String,
    pub location: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiCloudConfig {
    pub data_centers: Vec<DataCenterConfig>,
    pub edge_nodes: Vec<EdgeNodeConfig>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"http_port": 9000}"#).unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.replica_count, 1);
        assert_eq!(config.advanced.cleanup_interval, 60);
        assert!(config.replication.hinted_handoff_enabled);
        assert_eq!(
            config.replication.conflict_resolution,
            ConflictResolution::Lww
        );
    }

    #[test]
    fn full_config_roundtrip() {
        let config = Config {
            data_dir: "/tmp/distkv".to_string(),
            nodes: vec!["10.0.0.2:8080".to_string(), "10.0.0.3:8080".to_string()],
            replica_count: 2,
            ..Default::default()
        };

        let raw = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.data_dir, "/tmp/distkv");
    }
}
