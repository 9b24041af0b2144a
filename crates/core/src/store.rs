//! Persistence port for enriched results.

use async_trait::async_trait;

use crate::error::Result;
use crate::result::EnrichedResult;

/// Durable store for enriched results.
///
/// Implemented by ClickHouse in production and by in-memory stores in
/// tests. A failed call may have persisted a prefix of `results`; callers
/// must not assume atomicity.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persists a batch of results.
    async fn persist(&self, results: &[EnrichedResult]) -> Result<()>;

    /// Whether the backing store is reachable.
    async fn is_healthy(&self) -> bool {
        true
    }
}
