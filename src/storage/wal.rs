use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{KeyValue, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalOp {
    #[serde(rename = "SET")]
    Set,
    #[serde(rename = "DELETE")]
    Delete,
}

/// One JSON line in `wal.log`. Sequence numbers are strictly increasing;
/// replay is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    pub sequence: u64,
    pub op: WalOp,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub timestamp: i64,
}

struct WalInner {
    writer: BufWriter<File>,
    sequence: u64,
}

/// Append-only log under the data directory. Every record is flushed before
/// the caller's mutation proceeds.
pub struct WriteAheadLog {
    path: PathBuf,
    inner: Mutex<WalInner>,
}

impl WriteAheadLog {
    /// Opens (or creates) `wal.log`, restoring the sequence counter by
    /// parsing the existing records; the next append continues after the
    /// last record on disk.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("wal.log");

        let next_sequence = Self::read_records(&path)?
            .last()
            .map(|record| record.sequence + 1)
            .unwrap_or(0);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            inner: Mutex::new(WalInner {
                writer: BufWriter::new(file),
                sequence: next_sequence,
            }),
        })
    }

    fn read_records(path: &Path) -> Result<Vec<WalRecord>, StoreError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: WalRecord = serde_json::from_str(&line)
                .map_err(|e| StoreError::Corrupt(format!("wal record: {}", e)))?;
            records.push(record);
        }

        Ok(records)
    }

    pub fn log_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.append(WalOp::Set, key, Some(value.to_string()))
    }

    pub fn log_delete(&self, key: &str) -> Result<(), StoreError> {
        self.append(WalOp::Delete, key, None)
    }

    fn append(&self, op: WalOp, key: &str, value: Option<String>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        let record = WalRecord {
            sequence: inner.sequence,
            op,
            key: key.to_string(),
            value,
            timestamp: now_nanos(),
        };
        inner.sequence += 1;

        let line = serde_json::to_string(&record)
            .map_err(|e| StoreError::Corrupt(format!("serialize wal record: {}", e)))?;
        inner.writer.write_all(line.as_bytes())?;
        inner.writer.write_all(b"\n")?;
        inner.writer.flush()?;

        Ok(())
    }

    /// Replays the on-disk log, oldest record first, into `store`. A delete
    /// of an already-absent key is a no-op so replay stays idempotent.
    pub fn replay(&self, store: &dyn Store) -> Result<usize, StoreError> {
        let records = Self::read_records(&self.path)?;
        let replayed = records.len();

        for record in records {
            match record.op {
                WalOp::Set => {
                    let value = record.value.unwrap_or_default();
                    store.set(&record.key, &value)?;
                }
                WalOp::Delete => {
                    if let Err(e) = store.delete(&record.key) {
                        if !e.is_not_found() {
                            return Err(e);
                        }
                    }
                }
            }
        }

        Ok(replayed)
    }

    pub fn close(&self) -> Result<(), StoreError> {
        self.inner.lock().writer.flush()?;
        Ok(())
    }
}

/// Durability layer: each mutation is appended to the log and flushed before
/// the inner store is touched.
pub struct WalStore {
    inner: Arc<dyn Store>,
    wal: WriteAheadLog,
}

impl WalStore {
    pub fn new(inner: Arc<dyn Store>, wal: WriteAheadLog) -> Self {
        Self { inner, wal }
    }
}

impl Store for WalStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.wal.log_set(key, value)?;
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.wal.log_delete(key)?;
        self.inner.delete(key)
    }

    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError> {
        self.inner.list_all()
    }

    fn close(&self) -> Result<(), StoreError> {
        self.wal.close()?;
        self.inner.close()
    }
}

pub(crate) fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}
