//! Application configuration.
//!
//! Layered as: built-in defaults, then `config/default.toml` if present,
//! then `PIPELINE__<SECTION>__<KEY>` environment variables.

use anyhow::{Context, Result};
use clickhouse_client::ClickHouseConfig;
use serde::{Deserialize, Serialize};
use stream::{LogBackend, RedpandaConfig};
use worker::{EnrichmentConfig, MetricsConfig, PipelineConfig, RetentionConfig, SinkConfig};

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Which log backs the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub backend: LogBackend,
}

/// Where enriched results are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Log each result; nothing is stored
    #[default]
    Logging,
    ClickHouse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub enrichment: EnrichmentConfig,
    pub sink: SinkConfig,
    pub retention: RetentionConfig,
    pub metrics: MetricsConfig,
    pub log: LogConfig,
    pub store: StoreConfig,
    pub redpanda: RedpandaConfig,
    pub clickhouse: ClickHouseConfig,
}

impl Settings {
    /// Loads configuration from files and the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(environment())
    }

    fn load_with(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&Settings::default())?)
            // Load from config file if exists
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            // Override with environment variables
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("PIPELINE")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("redpanda.brokers")
}
