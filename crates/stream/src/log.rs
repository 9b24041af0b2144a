//! The durable log interface.

use async_trait::async_trait;
use inventory_core::{DeadLetter, InventoryRecord, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Arrival-ordered position of an entry in the log.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire shape of one log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Serialized payload (JSON)
    pub data: String,
    pub tenant_id: String,
    pub agent_id: String,
    /// Unix seconds of the payload timestamp, for range queries
    pub ordering_key: i64,
}

impl LogEntry {
    /// Encodes a normalized inventory record.
    pub fn from_record(record: &InventoryRecord) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_string(record)?,
            tenant_id: record.tenant_id.clone(),
            agent_id: record.agent_id.clone(),
            ordering_key: record.ordering_key(),
        })
    }

    /// Encodes a dead-lettered record.
    pub fn from_dead_letter(letter: &DeadLetter) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_string(letter)?,
            tenant_id: letter.record.tenant_id.clone(),
            agent_id: letter.record.agent_id.clone(),
            ordering_key: letter.failed_at.timestamp(),
        })
    }

    pub fn decode_record(&self) -> serde_json::Result<InventoryRecord> {
        serde_json::from_str(&self.data)
    }

    pub fn decode_dead_letter(&self) -> serde_json::Result<DeadLetter> {
        serde_json::from_str(&self.data)
    }
}

/// Earliest retained id and the id the next append will receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBounds {
    pub earliest: EntryId,
    pub next: EntryId,
}

impl LogBounds {
    pub fn len(&self) -> u64 {
        self.next.0.saturating_sub(self.earliest.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only, replayable log with bounded trimming.
#[async_trait]
pub trait StreamLog: Send + Sync {
    /// Appends an entry and returns its id.
    async fn append(&self, entry: LogEntry) -> Result<EntryId>;

    /// Reads up to `max_count` entries with id >= `from`, in order.
    ///
    /// Waits at most `block` when nothing is available and then returns an
    /// empty vec. A `from` below the earliest retained id reads from the
    /// earliest entry instead.
    async fn read(
        &self,
        from: EntryId,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<(EntryId, LogEntry)>>;

    /// Drops the oldest entries so at most `max_len` remain.
    ///
    /// Returns how many entries were removed.
    async fn trim(&self, max_len: u64) -> Result<u64>;

    async fn bounds(&self) -> Result<LogBounds>;

    async fn len(&self) -> Result<u64> {
        Ok(self.bounds().await?.len())
    }

    async fn health_check(&self) -> bool {
        self.bounds().await.is_ok()
    }

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
