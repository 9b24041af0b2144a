//! In-process log backend.

use async_trait::async_trait;
use inventory_core::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::log::{EntryId, LogBounds, LogEntry, StreamLog};

#[derive(Debug, Default)]
struct MemoryLogState {
    entries: VecDeque<(EntryId, LogEntry)>,
    next_id: EntryId,
}

/// Log held in memory, for tests and single-node development.
///
/// Ids are dense and start at zero; readers blocked in `read` are woken
/// on every append.
#[derive(Debug, Default)]
pub struct MemoryLog {
    state: Mutex<MemoryLogState>,
    appended: Notify,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, from: EntryId, max_count: usize) -> Vec<(EntryId, LogEntry)> {
        let state = self.state.lock();
        let Some(&(front, _)) = state.entries.front() else {
            return Vec::new();
        };

        let skip = from.0.saturating_sub(front.0) as usize;
        state
            .entries
            .iter()
            .skip(skip)
            .take(max_count)
            .cloned()
            .collect()
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> Vec<(EntryId, LogEntry)> {
        self.state.lock().entries.iter().cloned().collect()
    }
}

#[async_trait]
impl StreamLog for MemoryLog {
    async fn append(&self, entry: LogEntry) -> Result<EntryId> {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.entries.push_back((id, entry));
            state.next_id = id.next();
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }

    async fn read(
        &self,
        from: EntryId,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<(EntryId, LogEntry)>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let deadline = Instant::now() + block;
        loop {
            // Register for wakeups before looking, so an append between the
            // check and the wait is not missed.
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let entries = self.collect(from, max_count);
            if !entries.is_empty() {
                return Ok(entries);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn trim(&self, max_len: u64) -> Result<u64> {
        let mut state = self.state.lock();
        let mut removed = 0;
        while state.entries.len() as u64 > max_len {
            state.entries.pop_front();
            removed += 1;
        }
        Ok(removed)
    }

    async fn bounds(&self) -> Result<LogBounds> {
        let state = self.state.lock();
        let earliest = state
            .entries
            .front()
            .map(|(id, _)| *id)
            .unwrap_or(state.next_id);
        Ok(LogBounds {
            earliest,
            next: state.next_id,
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
