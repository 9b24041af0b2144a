//! Batch insert helpers for ClickHouse.

use crate::client::ClickHouseClient;
use clickhouse::Row;
use inventory_core::{EnrichedResult, Error, Result};
use serde::Serialize;
use telemetry::MetricsSnapshot;
use tracing::debug;

/// Flattened enriched result row.
#[derive(Debug, Clone, Row, Serialize)]
pub struct ResultRow {
    pub record_id: String,
    pub tenant_id: String,
    pub agent_id: String,
    /// JSON array of findings
    pub findings: String,
    pub finding_count: u32,
    /// Empty when there are no findings
    pub max_severity: String,
    pub enriched_at: i64, // milliseconds since epoch
    pub error: Option<String>,
}

impl ResultRow {
    pub fn from_result(result: &EnrichedResult) -> Result<Self> {
        Ok(Self {
            record_id: result.record_id.clone(),
            tenant_id: result.tenant_id.clone(),
            agent_id: result.agent_id.clone(),
            findings: serde_json::to_string(&result.findings)?,
            finding_count: result.findings.len() as u32,
            max_severity: result
                .max_severity()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            enriched_at: result.enriched_at.timestamp_millis(),
            error: result.error.clone(),
        })
    }
}

/// Insert enriched results in one batch.
pub async fn insert_results(client: &ClickHouseClient, results: &[EnrichedResult]) -> Result<usize> {
    if results.is_empty() {
        return Ok(0);
    }

    let start = std::time::Instant::now();
    let rows = results
        .iter()
        .map(ResultRow::from_result)
        .collect::<Result<Vec<_>>>()?;

    let mut insert = client
        .inner()
        .insert("enriched_results")
        .map_err(|e| Error::persist(format!("Insert error: {}", e)))?;

    for row in &rows {
        insert
            .write(row)
            .await
            .map_err(|e| Error::persist(format!("Write error: {}", e)))?;
    }

    insert
        .end()
        .await
        .map_err(|e| Error::persist(format!("End error: {}", e)))?;

    debug!(
        count = rows.len(),
        latency_ms = %start.elapsed().as_millis(),
        "Inserted enriched results to ClickHouse"
    );

    Ok(rows.len())
}

/// Pipeline metrics row.
#[derive(Debug, Clone, Row, Serialize)]
pub struct MetricsRow {
    pub timestamp: i64,
    pub processed_total: u64,
    pub processed_today: u64,
    pub errors_total: u64,
    pub queue_size: u64,
    pub enqueued_total: u64,
    pub malformed_total: u64,
    pub dead_lettered_total: u64,
    pub batches_total: u64,
    pub trimmed_total: u64,
    pub batch_latency_mean_ms: f64,
}

impl From<MetricsSnapshot> for MetricsRow {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp.timestamp_millis(),
            processed_total: snapshot.processed_total,
            processed_today: snapshot.processed_today,
            errors_total: snapshot.errors_total,
            queue_size: snapshot.queue_size,
            enqueued_total: snapshot.enqueued_total,
            malformed_total: snapshot.malformed_total,
            dead_lettered_total: snapshot.dead_lettered_total,
            batches_total: snapshot.batches_total,
            trimmed_total: snapshot.trimmed_total,
            batch_latency_mean_ms: snapshot.batch_latency_mean_ms,
        }
    }
}

/// Insert a metrics snapshot.
pub async fn insert_metrics(client: &ClickHouseClient, snapshot: MetricsSnapshot) -> Result<()> {
    let row = MetricsRow::from(snapshot);

    let mut insert = client
        .inner()
        .insert("pipeline_metrics")
        .map_err(|e| Error::persist(format!("Insert error: {}", e)))?;

    insert
        .write(&row)
        .await
        .map_err(|e| Error::persist(format!("Write error: {}", e)))?;

    insert
        .end()
        .await
        .map_err(|e| Error::persist(format!("End error: {}", e)))?;

    Ok(())
}
