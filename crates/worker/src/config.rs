//! Worker-side configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool and consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum entries per batch read
    pub batch_size: usize,
    /// Number of worker loops
    pub workers: usize,
    /// How long a read waits for entries
    pub block_timeout_ms: u64,
    /// Sleep after an empty read
    pub idle_backoff_ms: u64,
    /// Consumer group shared by all workers
    pub consumer_group: String,
    /// JSON file holding committed offsets; in-memory when unset
    pub offsets_path: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            workers: 10,
            block_timeout_ms: 100,
            idle_backoff_ms: 100,
            consumer_group: "inventory-workers".to_string(),
            offsets_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Enrichment fan-out and oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Vulnerability service base URL
    pub url: String,
    /// Timeout for a single lookup
    pub lookup_timeout_ms: u64,
    /// Lookups in flight across all workers and tenants
    pub concurrency: usize,
    /// Attempts per lookup before dead-lettering
    pub max_attempts: u32,
    /// Linear backoff step between attempts
    pub retry_backoff_ms: u64,
    /// Cache lookups by (name, version)
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            lookup_timeout_ms: 60_000,
            concurrency: 32,
            max_attempts: 3,
            retry_backoff_ms: 100,
            cache_enabled: false,
            cache_ttl_secs: 300,
            cache_capacity: 10_000,
        }
    }
}

impl EnrichmentConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Result sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Persist attempts per batch before dead-lettering
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl SinkConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Log retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Entries kept after each trim
    pub max_entries: u64,
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            interval_secs: 3600,
        }
    }
}

impl RetentionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Metrics reporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub report_interval_secs: u64,
    /// Also write each snapshot to ClickHouse
    pub flush_to_clickhouse: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 30,
            flush_to_clickhouse: false,
        }
    }
}

impl MetricsConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}
