//! `ResultStore` backed by the `enriched_results` table.

use async_trait::async_trait;
use inventory_core::{EnrichedResult, Result, ResultStore};

use crate::client::ClickHouseClient;
use crate::health::check_connection;
use crate::insert::insert_results;

/// Persists enriched results to ClickHouse.
#[derive(Clone)]
pub struct ClickHouseResultStore {
    client: ClickHouseClient,
}

impl ClickHouseResultStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }
}

#[async_trait]
impl ResultStore for ClickHouseResultStore {
    async fn persist(&self, results: &[EnrichedResult]) -> Result<()> {
        insert_results(&self.client, results).await.map(|_| ())
    }

    async fn is_healthy(&self) -> bool {
        check_connection(&self.client).await
    }
}
