//! Consumer groups over a `StreamLog`.
//!
//! A group hands out disjoint claims from a shared claim cursor, so no two
//! workers in the same group see the same entry. Claims are acknowledged
//! once processed; the committed cursor advances only across a contiguous
//! prefix of acknowledged claims and is persisted through an `OffsetStore`.
//!
//! ```text
//! committed        claim cursor
//!     |                 |
//!     v                 v
//! ----[ c1 ][ c2 ][ c3 ]-------->
//!      acked pend  acked
//! ```
//!
//! After a restart the group resumes at the committed cursor, so anything
//! claimed but not committed is delivered again.

use inventory_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::log::{EntryId, LogEntry, StreamLog};
use crate::offsets::OffsetStore;

/// A half-open range `[start, end)` of log ids owned by one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub start: EntryId,
    pub end: EntryId,
}

impl Claim {
    /// Number of ids the claim spans, including ids lost to trimming.
    pub fn span(&self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }
}

/// Entries returned by one successful claim.
#[derive(Debug, Clone)]
pub struct ClaimedEntries {
    pub claim: Claim,
    pub entries: Vec<(EntryId, LogEntry)>,
}

#[derive(Debug, Clone, Copy)]
struct PendingClaim {
    end: EntryId,
    acked: bool,
}

#[derive(Debug)]
struct AckLedger {
    committed: EntryId,
    /// Outstanding claims keyed by start id
    pending: BTreeMap<EntryId, PendingClaim>,
}

/// A named consumer group reading one log.
pub struct ConsumerGroup {
    name: String,
    log: Arc<dyn StreamLog>,
    offsets: Arc<dyn OffsetStore>,
    /// Next id to claim. Held across the log read so claims never overlap.
    cursor: tokio::sync::Mutex<EntryId>,
    ledger: Mutex<AckLedger>,
    /// Last committed id written to the offset store
    persisted: tokio::sync::Mutex<EntryId>,
}

impl ConsumerGroup {
    /// Joins `name`, resuming from its stored committed offset or from the
    /// start of the log.
    pub async fn join(
        name: impl Into<String>,
        log: Arc<dyn StreamLog>,
        offsets: Arc<dyn OffsetStore>,
    ) -> Result<Self> {
        let name = name.into();
        let committed = offsets.load(&name).await?.unwrap_or_default();

        info!(
            group = %name,
            committed = %committed,
            backend = log.backend(),
            "Joined consumer group"
        );

        Ok(Self {
            name,
            log,
            offsets,
            cursor: tokio::sync::Mutex::new(committed),
            ledger: Mutex::new(AckLedger {
                committed,
                pending: BTreeMap::new(),
            }),
            persisted: tokio::sync::Mutex::new(committed),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self) -> &Arc<dyn StreamLog> {
        &self.log
    }

    /// Highest id below which every entry has been acknowledged.
    pub fn committed(&self) -> EntryId {
        self.ledger.lock().committed
    }

    /// Claims handed out but not yet committed.
    pub fn pending_claims(&self) -> usize {
        self.ledger.lock().pending.len()
    }

    /// Claims up to `max_count` entries past the claim cursor.
    ///
    /// Waits at most `block` for entries; returns `None` when none arrive.
    pub async fn claim(&self, max_count: usize, block: Duration) -> Result<Option<ClaimedEntries>> {
        let mut cursor = self.cursor.lock().await;

        let entries = self.log.read(*cursor, max_count, block).await?;
        let Some(&(last, _)) = entries.last() else {
            return Ok(None);
        };

        // The claim starts at the cursor even if trimming moved the first
        // entry forward, keeping claims contiguous.
        let claim = Claim {
            start: *cursor,
            end: last.next(),
        };
        self.ledger.lock().pending.insert(
            claim.start,
            PendingClaim {
                end: claim.end,
                acked: false,
            },
        );
        *cursor = claim.end;

        debug!(
            group = %self.name,
            start = %claim.start,
            end = %claim.end,
            entries = entries.len(),
            "Claimed entries"
        );

        Ok(Some(ClaimedEntries { claim, entries }))
    }

    /// Acknowledges a claim and returns the committed cursor afterwards.
    pub async fn ack(&self, claim: &Claim) -> Result<EntryId> {
        let advanced = {
            let mut guard = self.ledger.lock();
            let ledger = &mut *guard;

            match ledger.pending.get_mut(&claim.start) {
                Some(pending) if pending.end == claim.end => pending.acked = true,
                _ => {
                    return Err(Error::offset(format!(
                        "Unknown claim [{}, {}) in group {}",
                        claim.start, claim.end, self.name
                    )))
                }
            }

            let before = ledger.committed;
            while let Some(entry) = ledger.pending.first_entry() {
                if !entry.get().acked || *entry.key() != ledger.committed {
                    break;
                }
                ledger.committed = entry.get().end;
                entry.remove();
            }

            (ledger.committed != before).then_some(ledger.committed)
        };

        let Some(committed) = advanced else {
            return Ok(self.committed());
        };

        let mut persisted = self.persisted.lock().await;
        if committed > *persisted {
            self.offsets.store(&self.name, committed).await?;
            *persisted = committed;
            debug!(group = %self.name, committed = %committed, "Committed offset");
        }

        Ok(committed)
    }
}
