//! Query functions for reading results back (used in tests and admin).

use crate::client::ClickHouseClient;
use clickhouse::Row;
use inventory_core::{Error, Result};
use serde::Deserialize;

/// Query result for enriched-result verification.
#[derive(Debug, Clone, Row, Deserialize)]
pub struct QueryResultRow {
    pub record_id: String,
    pub tenant_id: String,
    pub agent_id: String,
    pub finding_count: u32,
    pub max_severity: String,
    pub error: Option<String>,
}

/// Count results for a tenant.
pub async fn count_results(client: &ClickHouseClient, tenant_id: &str) -> Result<u64> {
    let count: u64 = client
        .inner()
        .query("SELECT count() FROM enriched_results WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one()
        .await
        .map_err(|e| Error::internal(format!("Query error: {}", e)))?;
    Ok(count)
}

/// Fetch the most recent results for a tenant.
pub async fn query_results(
    client: &ClickHouseClient,
    tenant_id: &str,
    limit: u32,
) -> Result<Vec<QueryResultRow>> {
    let rows: Vec<QueryResultRow> = client
        .inner()
        .query(
            "SELECT record_id, tenant_id, agent_id, finding_count, max_severity, error \
             FROM enriched_results WHERE tenant_id = ? ORDER BY enriched_at DESC LIMIT ?",
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all()
        .await
        .map_err(|e| Error::internal(format!("Query error: {}", e)))?;
    Ok(rows)
}
