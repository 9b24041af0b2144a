//! Committed-offset persistence for consumer groups.

use async_trait::async_trait;
use inventory_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::log::EntryId;

/// Where a consumer group's committed cursor survives restarts.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    /// Returns the committed id for `group`, if one was stored.
    async fn load(&self, group: &str) -> Result<Option<EntryId>>;

    /// Stores the committed id for `group`.
    async fn store(&self, group: &str, committed: EntryId) -> Result<()>;
}

/// Offsets kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    offsets: Mutex<HashMap<String, EntryId>>,
}

impl MemoryOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OffsetStore for MemoryOffsetStore {
    async fn load(&self, group: &str) -> Result<Option<EntryId>> {
        Ok(self.offsets.lock().get(group).copied())
    }

    async fn store(&self, group: &str, committed: EntryId) -> Result<()> {
        self.offsets.lock().insert(group.to_string(), committed);
        Ok(())
    }
}

/// Offsets kept in a JSON file mapping group name to committed id.
///
/// Writes go to a sibling temp file that is then renamed over the target.
#[derive(Debug)]
pub struct FileOffsetStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileOffsetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, EntryId>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::offset(format!(
                    "Corrupt offset file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::offset(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl OffsetStore for FileOffsetStore {
    async fn load(&self, group: &str) -> Result<Option<EntryId>> {
        Ok(self.read_all().await?.get(group).copied())
    }

    async fn store(&self, group: &str, committed: EntryId) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut offsets = self.read_all().await?;
        offsets.insert(group.to_string(), committed);
        let bytes = serde_json::to_vec_pretty(&offsets)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| Error::offset(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::offset(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(group = group, committed = %committed, "Stored committed offset");
        Ok(())
    }
}
