//! Background workers for the inventory pipeline.
//!
//! - Worker pool (log → grouping → enrichment fan-out → result sink)
//! - Vulnerability oracles (HTTP, cached)
//! - Dead-letter routing
//! - Retention trimming and metrics reporting
//! - Scheduler tying the loops to one cancellation token

pub mod config;
pub mod dead_letter;
pub mod fanout;
pub mod grouping;
pub mod oracle;
pub mod pool;
pub mod processor;
pub mod reporter;
pub mod retention;
pub mod scheduler;
pub mod sink;

pub use config::*;
pub use dead_letter::{DeadLetterSink, LogDeadLetter, MemoryDeadLetter};
pub use fanout::EnrichmentFanout;
pub use grouping::{group_by_tenant, TenantPartition};
pub use oracle::{compare_versions, CachedOracle, HttpOracle, VulnerabilityOracle};
pub use pool::WorkerPool;
pub use processor::BatchProcessor;
pub use reporter::MetricsReporter;
pub use retention::RetentionTrimmer;
pub use scheduler::{PipelineScheduler, ScheduleConfig};
pub use sink::{LoggingResultStore, MemoryResultStore, ResultSink};
