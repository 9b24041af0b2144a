//! Dead-letter routing for records that exhausted their retry budget.

use async_trait::async_trait;
use inventory_core::{DeadLetter, Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use stream::{LogEntry, StreamLog};
use tracing::{debug, warn};

/// Destination for dead-lettered records.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn route(&self, letters: Vec<DeadLetter>) -> Result<()>;
}

/// Keeps the most recent dead letters in memory.
#[derive(Debug)]
pub struct MemoryDeadLetter {
    letters: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl MemoryDeadLetter {
    pub fn new(capacity: usize) -> Self {
        Self {
            letters: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.letters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.lock().is_empty()
    }
}

impl Default for MemoryDeadLetter {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetter {
    async fn route(&self, letters: Vec<DeadLetter>) -> Result<()> {
        let mut stored = self.letters.lock();
        for letter in letters {
            if stored.len() == self.capacity {
                if let Some(evicted) = stored.pop_front() {
                    warn!(key = %evicted.key(), "Dead letter evicted at capacity");
                }
            }
            stored.push_back(letter);
        }
        Ok(())
    }
}

/// Appends dead letters to a separate log (e.g. a dead-letter topic).
pub struct LogDeadLetter {
    log: Arc<dyn StreamLog>,
}

impl LogDeadLetter {
    pub fn new(log: Arc<dyn StreamLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl DeadLetterSink for LogDeadLetter {
    async fn route(&self, letters: Vec<DeadLetter>) -> Result<()> {
        for letter in &letters {
            let entry = LogEntry::from_dead_letter(letter)?;
            let entry_id = self
                .log
                .append(entry)
                .await
                .map_err(|e| Error::dead_letter(format!("{}: {}", letter.key(), e)))?;

            debug!(
                key = %letter.key(),
                stage = %letter.stage,
                attempts = letter.attempts,
                entry_id = %entry_id,
                "Dead letter appended"
            );
        }
        Ok(())
    }
}
