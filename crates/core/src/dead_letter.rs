//! Dead-letter entries for records that exhausted their retry budget.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::InventoryRecord;

/// Pipeline stage at which a record was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Enrichment,
    Persist,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enrichment => f.write_str("enrichment"),
            Self::Persist => f.write_str("persist"),
        }
    }
}

/// A record routed aside for operator inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub record: InventoryRecord,
    pub stage: FailureStage,
    pub reason: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        record: InventoryRecord,
        stage: FailureStage,
        reason: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            record,
            stage,
            reason: reason.into(),
            attempts,
            failed_at: Utc::now(),
        }
    }

    /// Key for storage and lookups: `dlq:{tenant}:{record}`.
    pub fn key(&self) -> String {
        format!("dlq:{}:{}", self.record.tenant_id, self.record.id)
    }
}
