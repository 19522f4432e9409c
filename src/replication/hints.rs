use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::protocol::{internal_set_url, ReplicationRequest};
use crate::storage::wal::now_nanos;

const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// A write owed to a peer that was unreachable when it happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hint {
    pub key: String,
    pub value: String,
    pub node: String,
    /// Nanoseconds since epoch when the hint was first recorded.
    pub first_seen: i64,
    pub attempts: u32,
}

/// Persistent FIFO of undelivered writes, reloaded on startup from
/// `<dataDir>/hints/hints.json`. A background worker retries each hint until
/// it is delivered or exceeds the attempt cap; the file is rewritten once
/// per pass rather than per hint.
pub struct HintedHandoff {
    dir: PathBuf,
    hints: Mutex<Vec<Hint>>,
    max_attempts: u32,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl HintedHandoff {
    pub fn new(dir: PathBuf) -> Self {
        let handoff = Self {
            dir,
            hints: Mutex::new(Vec::new()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            client: reqwest::Client::new(),
        };

        if let Err(e) = fs::create_dir_all(&handoff.dir) {
            tracing::warn!("Failed to create hint directory: {}", e);
        }
        if let Err(e) = handoff.load() {
            tracing::warn!("Failed to load persisted hints: {}", e);
        }

        handoff
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn hints_file(&self) -> PathBuf {
        self.dir.join("hints.json")
    }

    pub fn store_hint(&self, key: &str, value: &str, node: &str) {
        {
            let mut hints = self.hints.lock();
            hints.push(Hint {
                key: key.to_string(),
                value: value.to_string(),
                node: node.to_string(),
                first_seen: now_nanos(),
                attempts: 0,
            });
        }

        if let Err(e) = self.save() {
            tracing::warn!("Failed to persist hints: {}", e);
        }
    }

    pub fn pending(&self) -> usize {
        self.hints.lock().len()
    }

    pub fn pending_for(&self, node: &str) -> usize {
        self.hints.lock().iter().filter(|h| h.node == node).count()
    }

    fn load(&self) -> anyhow::Result<()> {
        let path = self.hints_file();
        if !path.exists() {
            return Ok(());
        }

        let raw = fs::read_to_string(path)?;
        let loaded: Vec<Hint> = serde_json::from_str(&raw)?;
        *self.hints.lock() = loaded;

        Ok(())
    }

    fn save(&self) -> anyhow::Result<()> {
        let raw = {
            let hints = self.hints.lock();
            serde_json::to_string(&*hints)?
        };
        fs::write(self.hints_file(), raw)?;

        Ok(())
    }

    /// One worker pass: every hint gets an attempt, delivered and expired
    /// hints drop out, the rest keep their place in line.
    pub async fn retry_pass(&self) {
        let pending = std::mem::take(&mut *self.hints.lock());
        if pending.is_empty() {
            return;
        }

        let mut remaining = Vec::new();
        for mut hint in pending {
            hint.attempts += 1;

            match self.try_deliver(&hint).await {
                Ok(()) => {
                    tracing::info!(
                        "Delivered hint for {} to {} (attempt {})",
                        hint.key,
                        hint.node,
                        hint.attempts
                    );
                }
                Err(e) if hint.attempts >= self.max_attempts => {
                    tracing::warn!(
                        "Dropping hint for {} to {} after {} attempts: {}",
                        hint.key,
                        hint.node,
                        hint.attempts,
                        e
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        "Hint delivery to {} failed (attempt {}): {}",
                        hint.node,
                        hint.attempts,
                        e
                    );
                    remaining.push(hint);
                }
            }
        }

        {
            // Hints stored during the pass queue up behind the survivors.
            let mut hints = self.hints.lock();
            let newly_added = std::mem::take(&mut *hints);
            *hints = remaining;
            hints.extend(newly_added);
        }

        if let Err(e) = self.save() {
            tracing::warn!("Failed to persist hints after retry pass: {}", e);
        }
    }

    async fn try_deliver(&self, hint: &Hint) -> anyhow::Result<()> {
        let body = ReplicationRequest {
            key: hint.key.clone(),
            value: hint.value.clone(),
        };

        let response = self
            .client
            .post(internal_set_url(&hint.node))
            .json(&body)
            .timeout(DELIVERY_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status());
        }

        Ok(())
    }

    pub fn spawn_retry_worker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let handoff = self.clone();
        tokio::spawn(async move {
            loop {
                // Jitter the wakeup so nodes in a cluster don't hammer a
                // recovering peer in lockstep.
                let jitter = Duration::from_millis(rand::random::<u64>() % 500);
                tokio::time::sleep(handoff.retry_delay + jitter).await;
                handoff.retry_pass().await;
            }
        })
    }
}
