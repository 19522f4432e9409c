use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// How recently a client must have been active for its reads to stick to
/// the last written replica.
const STICKY_WINDOW: Duration = Duration::from_secs(5);

/// Idle client sessions are dropped after this long.
const SESSION_MAX_AGE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub node: String,
    pub at: Instant,
}

/// Tracks which peer last acknowledged each key's write and which clients
/// are active, giving read-your-writes stickiness for recent writers.
pub struct ConsistencyManager {
    last_writes: DashMap<String, WriteRecord>,
    client_sessions: DashMap<String, Instant>,
}

impl ConsistencyManager {
    pub fn new() -> Self {
        Self {
            last_writes: DashMap::new(),
            client_sessions: DashMap::new(),
        }
    }

    pub fn record_write(&self, key: &str, node: &str) {
        self.last_writes.insert(
            key.to_string(),
            WriteRecord {
                node: node.to_string(),
                at: Instant::now(),
            },
        );
    }

    pub fn touch_session(&self, client_id: &str) {
        self.client_sessions
            .insert(client_id.to_string(), Instant::now());
    }

    /// Preferred peer for a read, when the client wrote recently enough for
    /// stickiness to matter.
    pub fn preferred_node(&self, client_id: &str, key: &str) -> Option<String> {
        let active = self
            .client_sessions
            .get(client_id)
            .map(|at| at.elapsed() < STICKY_WINDOW)
            .unwrap_or(false);
        if !active {
            return None;
        }

        self.last_writes.get(key).map(|w| w.node.clone())
    }

    pub fn cleanup_sessions(&self, max_age: Duration) {
        self.client_sessions.retain(|_, at| at.elapsed() <= max_age);
    }

    pub fn session_count(&self) -> usize {
        self.client_sessions.len()
    }

    /// Starts the periodic session reaper; sessions idle longer than five
    /// minutes are forgotten.
    pub fn spawn_cleanup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                manager.cleanup_sessions(SESSION_MAX_AGE);
            }
        })
    }
}

impl Default for ConsistencyManager {
    fn default() -> Self {
        Self::new()
    }
}
