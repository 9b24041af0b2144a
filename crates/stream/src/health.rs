//! Redpanda topic checks.

use crate::config::RedpandaConfig;
use crate::redpanda::client_builder;
use inventory_core::{Error, Result};
use std::collections::HashSet;
use tracing::debug;

/// Returns the configured log topics that do not exist yet.
///
/// Connection and metadata failures are returned as errors rather than
/// reported as missing topics.
pub async fn missing_topics(config: &RedpandaConfig) -> Result<Vec<String>> {
    let client = client_builder(config)
        .build()
        .await
        .map_err(|e| Error::internal(format!("Failed to connect to Redpanda: {}", e)))?;

    let existing: HashSet<String> = client
        .list_topics()
        .await
        .map_err(|e| Error::internal(format!("Failed to list Redpanda topics: {}", e)))?
        .into_iter()
        .map(|t| t.name)
        .collect();
    debug!(topics = existing.len(), "Listed Redpanda topics");

    Ok(absent(
        &[config.topic.as_str(), config.dead_letter_topic.as_str()],
        &existing,
    ))
}

fn absent(wanted: &[&str], existing: &HashSet<String>) -> Vec<String> {
    wanted
        .iter()
        .copied()
        .filter(|t| !existing.contains(*t))
        .map(str::to_string)
        .collect()
}
