//! ClickHouse table schemas.
//!
//! - `enriched_results`: one row per enriched record, findings as a JSON blob
//! - `pipeline_metrics`: periodic metric snapshots
//!
//! DateTime64(3) columns are written as milliseconds since epoch.

/// SQL for creating the enriched results table.
pub fn create_enriched_results_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.enriched_results (
    record_id String,
    tenant_id String,
    agent_id String,

    -- JSON array of findings
    findings String,
    finding_count UInt32,
    max_severity LowCardinality(String),

    enriched_at DateTime64(3),
    error Nullable(String),

    created_at DateTime DEFAULT now()
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(enriched_at)
ORDER BY (tenant_id, enriched_at, record_id)
TTL toDateTime(enriched_at) + INTERVAL 90 DAY
SETTINGS index_granularity = 8192
"#
    )
}

/// SQL for creating the pipeline metrics table.
pub fn create_pipeline_metrics_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.pipeline_metrics (
    timestamp DateTime64(3),
    processed_total UInt64,
    processed_today UInt64,
    errors_total UInt64,
    queue_size UInt64,
    enqueued_total UInt64,
    malformed_total UInt64,
    dead_lettered_total UInt64,
    batches_total UInt64,
    trimmed_total UInt64,
    batch_latency_mean_ms Float64
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY timestamp
TTL toDateTime(timestamp) + INTERVAL 30 DAY
SETTINGS index_granularity = 8192
"#
    )
}

pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {database}")
}

/// All creation statements, database first.
pub fn all_tables(database: &str) -> Vec<String> {
    vec![
        create_database(database),
        create_enriched_results_table(database),
        create_pipeline_metrics_table(database),
    ]
}
