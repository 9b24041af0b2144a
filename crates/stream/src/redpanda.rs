//! Redpanda-backed log using rskafka.
//!
//! Each log entry is one Kafka record on a single partition:
//! - value: `data`
//! - headers: `tenant_id`, `agent_id`, `ordering_key`
//! - key: tenant ID
//!
//! Entry ids are partition offsets. Trimming uses delete-records, so the
//! earliest retained offset moves forward and reads below it are clamped.

use async_trait::async_trait;
use chrono::Utc;
use inventory_core::{Error, Result};
use rskafka::client::{
    partition::{Compression, OffsetAt, PartitionClient, UnknownTopicHandling},
    ClientBuilder, Credentials, SaslConfig,
};
use rskafka::record::Record;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::RedpandaConfig;
use crate::log::{EntryId, LogBounds, LogEntry, StreamLog};

const HEADER_TENANT_ID: &str = "tenant_id";
const HEADER_AGENT_ID: &str = "agent_id";
const HEADER_ORDERING_KEY: &str = "ordering_key";

/// Creates a TLS configuration for Redpanda Cloud.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Client builder for `config`, with TLS and SASL when credentials are set.
pub(crate) fn client_builder(config: &RedpandaConfig) -> ClientBuilder {
    let builder = ClientBuilder::new(vec![config.broker_string()]);

    match (&config.sasl_username, &config.sasl_password) {
        (Some(username), Some(password)) => builder
            .tls_config(create_tls_config())
            .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                username.clone(),
                password.clone(),
            ))),
        _ => builder,
    }
}

fn parse_compression(name: &str) -> Compression {
    match name {
        "gzip" => Compression::Gzip,
        "snappy" => Compression::Snappy,
        "lz4" => Compression::Lz4,
        "zstd" => Compression::Zstd,
        _ => Compression::NoCompression,
    }
}

fn to_record(entry: LogEntry) -> Record {
    let mut headers = BTreeMap::new();
    headers.insert(HEADER_TENANT_ID.to_string(), entry.tenant_id.clone().into_bytes());
    headers.insert(HEADER_AGENT_ID.to_string(), entry.agent_id.into_bytes());
    headers.insert(
        HEADER_ORDERING_KEY.to_string(),
        entry.ordering_key.to_string().into_bytes(),
    );

    Record {
        key: Some(entry.tenant_id.into_bytes()),
        value: Some(entry.data.into_bytes()),
        headers,
        timestamp: Utc::now(),
    }
}

fn header_string(record: &Record, name: &str) -> String {
    record
        .headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .unwrap_or_default()
}

/// Rebuilds the wire entry; bad bytes surface later as a malformed record.
fn from_record(record: &Record) -> LogEntry {
    // Invalid UTF-8 leaves `data` empty, which never decodes as a record.
    let data = match record.value.as_deref().map(|v| String::from_utf8(v.to_vec())) {
        Some(Ok(data)) => data,
        Some(Err(e)) => {
            warn!(error = %e, "Record value is not valid UTF-8");
            String::new()
        }
        None => String::new(),
    };

    LogEntry {
        data,
        tenant_id: header_string(record, HEADER_TENANT_ID),
        agent_id: header_string(record, HEADER_AGENT_ID),
        ordering_key: header_string(record, HEADER_ORDERING_KEY)
            .parse()
            .unwrap_or_default(),
    }
}

/// Log stored in a Redpanda topic partition.
pub struct RedpandaLog {
    config: RedpandaConfig,
    compression: Compression,
    /// Cached partition client, dropped on connection errors
    partition_client: RwLock<Option<Arc<PartitionClient>>>,
}

impl RedpandaLog {
    pub fn new(config: RedpandaConfig) -> Self {
        info!(
            brokers = ?config.brokers,
            topic = %config.topic,
            partition = config.partition,
            "Creating Redpanda log"
        );

        Self {
            compression: parse_compression(&config.compression),
            config,
            partition_client: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &RedpandaConfig {
        &self.config
    }

    /// Returns the cached partition client, connecting if needed.
    async fn ensure_connected(&self) -> Result<Arc<PartitionClient>> {
        {
            let client = self.partition_client.read().await;
            if let Some(ref c) = *client {
                return Ok(c.clone());
            }
        }

        let client = client_builder(&self.config)
            .build()
            .await
            .map_err(|e| Error::internal(format!("Failed to connect to Redpanda: {}", e)))?;

        let partition_client = client
            .partition_client(
                self.config.topic.clone(),
                self.config.partition,
                UnknownTopicHandling::Retry,
            )
            .await
            .map_err(|e| Error::internal(format!("Failed to get partition client: {}", e)))?;

        let partition_client = Arc::new(partition_client);
        *self.partition_client.write().await = Some(partition_client.clone());

        debug!(topic = %self.config.topic, "Connected Redpanda partition client");
        Ok(partition_client)
    }

    /// Drops the cached client so the next call reconnects.
    pub async fn reset_connection(&self) {
        *self.partition_client.write().await = None;
        info!(topic = %self.config.topic, "Redpanda connection reset");
    }

    async fn offsets(&self, client: &PartitionClient) -> Result<(i64, i64)> {
        let earliest = client
            .get_offset(OffsetAt::Earliest)
            .await
            .map_err(|e| Error::read(format!("Failed to get earliest offset: {}", e)))?;
        let latest = client
            .get_offset(OffsetAt::Latest)
            .await
            .map_err(|e| Error::read(format!("Failed to get latest offset: {}", e)))?;
        Ok((earliest, latest))
    }
}

#[async_trait]
impl StreamLog for RedpandaLog {
    async fn append(&self, entry: LogEntry) -> Result<EntryId> {
        let client = self
            .ensure_connected()
            .await
            .map_err(|e| Error::append(e.to_string()))?;

        match client.produce(vec![to_record(entry)], self.compression).await {
            Ok(offsets) => {
                let offset = offsets
                    .first()
                    .copied()
                    .ok_or_else(|| Error::append("Broker returned no offset"))?;
                Ok(EntryId(offset.max(0) as u64))
            }
            Err(e) => {
                error!(topic = %self.config.topic, error = %e, "Failed to append to Redpanda");
                self.reset_connection().await;
                Err(Error::append(format!("Failed to produce: {}", e)))
            }
        }
    }

    async fn read(
        &self,
        from: EntryId,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<(EntryId, LogEntry)>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let client = self
            .ensure_connected()
            .await
            .map_err(|e| Error::read(e.to_string()))?;

        let earliest = client
            .get_offset(OffsetAt::Earliest)
            .await
            .map_err(|e| Error::read(format!("Failed to get earliest offset: {}", e)))?;
        let start = (from.0 as i64).max(earliest);

        let max_wait_ms = block.as_millis().min(i32::MAX as u128) as i32;
        let (records, _high_watermark) = match client
            .fetch_records(start, 1..self.config.fetch_max_bytes, max_wait_ms)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(topic = %self.config.topic, error = %e, "Fetch error");
                self.reset_connection().await;
                return Err(Error::read(format!("Failed to fetch records: {}", e)));
            }
        };

        // Compressed batches can start before the requested offset.
        let entries: Vec<(EntryId, LogEntry)> = records
            .into_iter()
            .filter(|r| r.offset >= start)
            .take(max_count)
            .map(|r| (EntryId(r.offset as u64), from_record(&r.record)))
            .collect();

        if start > from.0 as i64 {
            warn!(
                requested = from.0,
                earliest = earliest,
                "Requested offset was trimmed, reading from earliest"
            );
        }

        Ok(entries)
    }

    async fn trim(&self, max_len: u64) -> Result<u64> {
        let client = self
            .ensure_connected()
            .await
            .map_err(|e| Error::trim(e.to_string()))?;
        let (earliest, latest) = self
            .offsets(&client)
            .await
            .map_err(|e| Error::trim(e.to_string()))?;

        let len = (latest - earliest).max(0) as u64;
        if len <= max_len {
            return Ok(0);
        }

        let cutoff = latest - max_len as i64;
        let timeout_ms = self.config.request_timeout_ms.min(i32::MAX as u64) as i32;
        client
            .delete_records(cutoff, timeout_ms)
            .await
            .map_err(|e| Error::trim(format!("Failed to delete records: {}", e)))?;

        Ok((cutoff - earliest) as u64)
    }

    async fn bounds(&self) -> Result<LogBounds> {
        let client = self.ensure_connected().await?;
        let (earliest, latest) = self.offsets(&client).await?;
        Ok(LogBounds {
            earliest: EntryId(earliest.max(0) as u64),
            next: EntryId(latest.max(0) as u64),
        })
    }

    async fn health_check(&self) -> bool {
        match self.bounds().await {
            Ok(_) => true,
            Err(e) => {
                error!(topic = %self.config.topic, error = %e, "Redpanda log health check failed");
                false
            }
        }
    }

    fn backend(&self) -> &'static str {
        "redpanda"
    }
}
