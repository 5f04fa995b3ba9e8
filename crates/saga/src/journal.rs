//! Saga journal: ordered audit events per order.
//!
//! [`InMemorySagaJournal`] keeps events for the life of the process.
//! [`FileSagaJournal`] appends one JSON line per event and replays the file
//! on open, so anomalies survive restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::events::{CompensationAnomalyData, SagaEvent};

/// Errors raised by journal implementations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A line in the journal file could not be parsed.
    #[error("Corrupt journal entry at line {line}: {source}")]
    Corrupt {
        line: usize,
        source: serde_json::Error,
    },
}

/// One journaled event, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub order_id: OrderId,
    pub event: SagaEvent,
}

/// Append-only storage for saga events.
#[async_trait]
pub trait SagaJournal: Send + Sync {
    /// Appends an event to the order's history. Once this returns `Ok` the
    /// event is as durable as the implementation allows.
    async fn append(&self, order_id: OrderId, event: &SagaEvent) -> Result<(), JournalError>;

    /// Returns the order's events in append order.
    async fn events_for(&self, order_id: OrderId) -> Result<Vec<SagaEvent>, JournalError>;

    /// Returns every compensation anomaly recorded, oldest first.
    async fn anomalies(&self) -> Result<Vec<(OrderId, CompensationAnomalyData)>, JournalError>;
}

#[async_trait]
impl<T: SagaJournal + ?Sized> SagaJournal for Arc<T> {
    async fn append(&self, order_id: OrderId, event: &SagaEvent) -> Result<(), JournalError> {
        (**self).append(order_id, event).await
    }

    async fn events_for(&self, order_id: OrderId) -> Result<Vec<SagaEvent>, JournalError> {
        (**self).events_for(order_id).await
    }

    async fn anomalies(&self) -> Result<Vec<(OrderId, CompensationAnomalyData)>, JournalError> {
        (**self).anomalies().await
    }
}

#[derive(Debug, Default)]
struct JournalIndex {
    by_order: HashMap<OrderId, Vec<SagaEvent>>,
    anomalies: Vec<(OrderId, CompensationAnomalyData)>,
}

impl JournalIndex {
    fn insert(&mut self, order_id: OrderId, event: SagaEvent) {
        if let SagaEvent::CompensationAnomaly(ref data) = event {
            self.anomalies.push((order_id, data.clone()));
        }
        self.by_order.entry(order_id).or_default().push(event);
    }

    fn events_for(&self, order_id: OrderId) -> Vec<SagaEvent> {
        self.by_order.get(&order_id).cloned().unwrap_or_default()
    }
}

/// In-memory journal. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemorySagaJournal {
    index: Arc<RwLock<JournalIndex>>,
}

impl InMemorySagaJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of orders with at least one event.
    pub async fn saga_count(&self) -> usize {
        self.index.read().await.by_order.len()
    }
}

#[async_trait]
impl SagaJournal for InMemorySagaJournal {
    async fn append(&self, order_id: OrderId, event: &SagaEvent) -> Result<(), JournalError> {
        self.index.write().await.insert(order_id, event.clone());
        Ok(())
    }

    async fn events_for(&self, order_id: OrderId) -> Result<Vec<SagaEvent>, JournalError> {
        Ok(self.index.read().await.events_for(order_id))
    }

    async fn anomalies(&self) -> Result<Vec<(OrderId, CompensationAnomalyData)>, JournalError> {
        Ok(self.index.read().await.anomalies.clone())
    }
}

/// Journal backed by a JSON-lines file.
///
/// Each append is written and synced before it is indexed, so a reader never
/// sees an event that is not on disk.
#[derive(Debug)]
pub struct FileSagaJournal {
    path: PathBuf,
    file: Mutex<File>,
    index: RwLock<JournalIndex>,
}

impl FileSagaJournal {
    /// Opens or creates the journal file and replays its contents.
    ///
    /// An unparsable final line is a write torn by a crash; it is logged and
    /// truncated away. An unparsable line anywhere else is [`JournalError::Corrupt`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let replay = replay(&contents)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        if replay.valid_len < contents.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                line = replay.lines,
                dropped_bytes = contents.len() as u64 - replay.valid_len,
                "truncating torn journal entry"
            );
            file.set_len(replay.valid_len).await?;
        } else if replay.missing_newline {
            file.write_all(b"\n").await?;
        }
        file.sync_data().await?;

        let index = replay.index;
        tracing::info!(
            path = %path.display(),
            sagas = index.by_order.len(),
            anomalies = index.anomalies.len(),
            "saga journal opened"
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            index: RwLock::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SagaJournal for FileSagaJournal {
    async fn append(&self, order_id: OrderId, event: &SagaEvent) -> Result<(), JournalError> {
        let entry = JournalEntry {
            order_id,
            event: event.clone(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        let len = file.metadata().await?.len();
        if let Err(err) = write_line(&mut file, &line).await {
            // Keep a partial write from being glued to the next entry
            if let Err(rollback) = file.set_len(len).await {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial journal write"
                );
            }
            return Err(err.into());
        }

        // Indexed while the file lock is held so index order matches file order.
        self.index.write().await.insert(order_id, entry.event);
        Ok(())
    }

    async fn events_for(&self, order_id: OrderId) -> Result<Vec<SagaEvent>, JournalError> {
        Ok(self.index.read().await.events_for(order_id))
    }

    async fn anomalies(&self) -> Result<Vec<(OrderId, CompensationAnomalyData)>, JournalError> {
        Ok(self.index.read().await.anomalies.clone())
    }
}

async fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await?;
    file.sync_data().await
}

struct Replay {
    index: JournalIndex,
    /// Bytes up to the end of the last intact entry.
    valid_len: u64,
    /// Number of the torn line when one was dropped, else the line count.
    lines: usize,
    /// The final entry is intact but its newline was never written.
    missing_newline: bool,
}

fn replay(contents: &[u8]) -> Result<Replay, JournalError> {
    let mut index = JournalIndex::default();
    let mut offset = 0usize;
    let mut lines = 0;
    let mut missing_newline = false;

    let mut segments = contents.split_inclusive(|&b| b == b'\n').peekable();
    while let Some(segment) = segments.next() {
        lines += 1;
        let is_last = segments.peek().is_none();
        let body = segment.strip_suffix(b"\n").unwrap_or(segment);

        if body.iter().all(u8::is_ascii_whitespace) {
            offset += segment.len();
            continue;
        }

        match serde_json::from_slice::<JournalEntry>(body) {
            Ok(entry) => {
                index.insert(entry.order_id, entry.event);
                offset += segment.len();
                missing_newline = is_last && !segment.ends_with(b"\n");
            }
            Err(_) if is_last => break,
            Err(source) => return Err(JournalError::Corrupt { line: lines, source }),
        }
    }

    Ok(Replay {
        index,
        valid_len: offset as u64,
        lines,
        missing_newline,
    })
}
