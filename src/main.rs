//! Inventory Pipeline
//!
//! Software-inventory ingestion and vulnerability enrichment:
//! - HTTP ingest validated and appended to a durable log
//! - Worker pool reading the log through one consumer group
//! - Per-tenant enrichment fan-out against a vulnerability service
//! - Result persistence to ClickHouse with dead-lettering
//! - Background metrics reporting and log retention

mod settings;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use api::{router, AppState};
use clickhouse_client::{ClickHouseClient, ClickHouseResultStore};
use inventory_core::ResultStore;
use stream::{
    BatchReader, ConsumerGroup, EnqueueGate, FileOffsetStore, LogBackend, MemoryLog,
    MemoryOffsetStore, OffsetStore, RedpandaLog, StreamLog,
};
use telemetry::{init_tracing_from_env, HealthRegistry, PipelineMetrics};
use worker::{
    BatchProcessor, CachedOracle, DeadLetterSink, EnrichmentFanout, HttpOracle, LogDeadLetter,
    LoggingResultStore, MemoryDeadLetter, MetricsReporter, PipelineScheduler, ResultSink,
    RetentionTrimmer, ScheduleConfig, VulnerabilityOracle, WorkerPool,
};

use crate::settings::{Settings, StoreBackend};

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ requires explicit crypto provider selection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Inventory Pipeline v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;

    let metrics = Arc::new(PipelineMetrics::new());
    let health = Arc::new(HealthRegistry::new());

    let (log, dead_letters) = build_log(&settings).await;

    let offsets: Arc<dyn OffsetStore> = match &settings.pipeline.offsets_path {
        Some(path) => Arc::new(FileOffsetStore::new(path.clone())),
        None => Arc::new(MemoryOffsetStore::new()),
    };

    let clickhouse = build_clickhouse(&settings).await;
    let result_store: Arc<dyn ResultStore> = match &clickhouse {
        Some(client) => Arc::new(ClickHouseResultStore::new(client.clone())),
        None => Arc::new(LoggingResultStore),
    };

    let oracle = build_oracle(&settings)?;

    // Worker side
    let group = ConsumerGroup::join(&settings.pipeline.consumer_group, log.clone(), offsets)
        .await
        .context("Failed to join consumer group")?;
    let reader = BatchReader::new(Arc::new(group), metrics.clone());

    let fanout = EnrichmentFanout::new(
        oracle,
        dead_letters.clone(),
        metrics.clone(),
        settings.enrichment.clone(),
    );
    let sink = ResultSink::new(
        result_store.clone(),
        dead_letters,
        metrics.clone(),
        settings.sink.clone(),
    );
    let processor = Arc::new(BatchProcessor::new(fanout, sink, metrics.clone()));

    let token = CancellationToken::new();
    let pool = Arc::new(WorkerPool::new(
        reader,
        processor,
        settings.pipeline.clone(),
        token.child_token(),
    ));

    let mut reporter = MetricsReporter::new(metrics.clone());
    if settings.metrics.flush_to_clickhouse {
        match &clickhouse {
            Some(client) => reporter = reporter.with_clickhouse(client.clone()),
            None => warn!("Metrics flush requested but the ClickHouse store is not enabled"),
        }
    }

    let scheduler = PipelineScheduler::new(
        pool,
        reporter,
        RetentionTrimmer::new(log.clone(), metrics.clone(), settings.retention.max_entries),
        ScheduleConfig {
            report_interval: settings.metrics.report_interval(),
            retention_interval: settings.retention.interval(),
        },
        token,
    );

    // HTTP side
    let state = AppState::new(
        EnqueueGate::new(log, metrics.clone()),
        result_store,
        metrics,
        health.clone(),
    );

    state.refresh_health().await;
    for component in health.report().components {
        if component.healthy {
            info!(component = %component.name, "Connection: healthy");
        } else {
            error!(
                component = %component.name,
                message = component.message.as_deref().unwrap_or(""),
                "Connection: unhealthy"
            );
        }
    }

    scheduler.start();

    let app = router(state);

    let addr: SocketAddr = settings
        .listen_addr()
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    info!("Shutting down...");

    // Drain in-flight batches before exiting, even if the server failed.
    scheduler.shutdown().await;

    served?;
    info!("Shutdown complete");
    Ok(())
}

/// Builds the record log and the dead-letter channel next to it.
async fn build_log(settings: &Settings) -> (Arc<dyn StreamLog>, Arc<dyn DeadLetterSink>) {
    match settings.log.backend {
        LogBackend::Memory => {
            warn!("Using in-memory log; queued records are lost on restart");
            let log: Arc<dyn StreamLog> = Arc::new(MemoryLog::new());
            let dead_letters: Arc<dyn DeadLetterSink> = Arc::new(MemoryDeadLetter::default());
            (log, dead_letters)
        }
        LogBackend::Redpanda => {
            let config = &settings.redpanda;
            info!(
                brokers = %config.broker_string(),
                topic = %config.topic,
                dead_letter_topic = %config.dead_letter_topic,
                sasl_username = config.sasl_username.as_deref().unwrap_or("none"),
                "Using Redpanda log"
            );

            match stream::health::missing_topics(config).await {
                Ok(missing) if !missing.is_empty() => {
                    warn!(topics = ?missing, "Redpanda topics not found; create them before ingesting");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Could not check Redpanda topics"),
            }

            let dead_letter_log =
                Arc::new(RedpandaLog::new(config.for_topic(config.dead_letter_topic.clone())));
            let log: Arc<dyn StreamLog> = Arc::new(RedpandaLog::new(config.clone()));
            let dead_letters: Arc<dyn DeadLetterSink> =
                Arc::new(LogDeadLetter::new(dead_letter_log));
            (log, dead_letters)
        }
    }
}

/// Creates the ClickHouse client when it is the configured result store.
async fn build_clickhouse(settings: &Settings) -> Option<ClickHouseClient> {
    if settings.store.backend != StoreBackend::ClickHouse {
        info!("Result store: logging only");
        return None;
    }

    let client = ClickHouseClient::new(settings.clickhouse.clone());

    if settings.clickhouse.init_schema {
        if let Err(e) = clickhouse_client::health::init_schema(&client).await {
            // Continue anyway - schema might already exist
            error!("Failed to initialize ClickHouse schema: {}", e);
        }
    }

    Some(client)
}

fn build_oracle(settings: &Settings) -> Result<Arc<dyn VulnerabilityOracle>> {
    let config = &settings.enrichment;
    let http = HttpOracle::new(config.url.clone(), config.lookup_timeout())
        .context("Failed to create enrichment client")?;

    if http.is_mock() {
        warn!("Enrichment service URL not set; using simulated findings");
    }

    let oracle: Arc<dyn VulnerabilityOracle> = Arc::new(http);
    if config.cache_enabled {
        info!(
            ttl_secs = config.cache_ttl_secs,
            capacity = config.cache_capacity,
            "Caching enrichment lookups"
        );
        return Ok(Arc::new(CachedOracle::new(
            oracle,
            config.cache_ttl(),
            config.cache_capacity,
        )));
    }

    Ok(oracle)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
