//! Log backend configuration.

use serde::{Deserialize, Serialize};

/// Which log implementation backs the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogBackend {
    /// In-process log; contents are lost on restart
    #[default]
    Memory,
    Redpanda,
}

/// Redpanda log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// Topic holding inventory records
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Topic receiving dead-lettered records
    #[serde(default = "default_dead_letter_topic")]
    pub dead_letter_topic: String,
    /// Partition used for both topics
    #[serde(default)]
    pub partition: i32,
    /// SASL username (for cloud authentication)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password (for cloud authentication)
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound on bytes returned by one fetch
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: i32,
}

fn default_topic() -> String {
    "inventory_queue".to_string()
}

fn default_dead_letter_topic() -> String {
    "inventory_dead_letter".to_string()
}

fn default_compression() -> String {
    "lz4".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_fetch_max_bytes() -> i32 {
    4 * 1024 * 1024
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: default_topic(),
            dead_letter_topic: default_dead_letter_topic(),
            partition: 0,
            sasl_username: None,
            sasl_password: None,
            compression: default_compression(),
            request_timeout_ms: default_request_timeout_ms(),
            fetch_max_bytes: default_fetch_max_bytes(),
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// Same connection settings, pointed at another topic.
    pub fn for_topic(&self, topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..self.clone()
        }
    }
}
