//! Enriched results written by the result sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::finding::{Finding, Severity};
use crate::record::InventoryRecord;

/// Outcome of enriching one inventory record.
///
/// Created once by the enrichment fan-out and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedResult {
    pub record_id: String,
    pub tenant_id: String,
    pub agent_id: String,
    pub findings: Vec<Finding>,
    pub enriched_at: DateTime<Utc>,
    /// Set when the enrichment lookup failed; `findings` is then empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichedResult {
    /// Builds a successful result for a record.
    pub fn enriched(record: &InventoryRecord, findings: Vec<Finding>) -> Self {
        Self {
            record_id: record.id.clone(),
            tenant_id: record.tenant_id.clone(),
            agent_id: record.agent_id.clone(),
            findings,
            enriched_at: Utc::now(),
            error: None,
        }
    }

    /// Builds a failed result carrying the error message.
    pub fn failed(record: &InventoryRecord, error: impl Into<String>) -> Self {
        Self {
            record_id: record.id.clone(),
            tenant_id: record.tenant_id.clone(),
            agent_id: record.agent_id.clone(),
            findings: Vec::new(),
            enriched_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Highest severity among the findings, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}
