//! Software-inventory records reported by agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};

/// One installed package observed by an agent.
///
/// Accepts the agent's legacy field names (`company_id`, `app_name`,
/// `app_version`) on input. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct InventoryRecord {
    /// Unique record ID (generated at enqueue when empty)
    #[serde(default)]
    #[validate(length(max = 128))]
    pub id: String,
    /// Tenant (company) partition key
    #[serde(default, alias = "company_id")]
    #[validate(length(max = 128))]
    pub tenant_id: String,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub agent_id: String,
    #[serde(default, alias = "app_name")]
    #[validate(length(max = 512))]
    pub name: String,
    #[serde(default, alias = "app_version")]
    #[validate(length(max = 128))]
    pub version: String,
    #[serde(default)]
    pub package_type: String,
    #[serde(default)]
    pub architecture: String,
    /// Observation time; the Unix epoch or earlier means "not set"
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl InventoryRecord {
    /// Creates a record with an unset ID and timestamp.
    pub fn new(
        tenant_id: impl Into<String>,
        agent_id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            tenant_id: tenant_id.into(),
            agent_id: agent_id.into(),
            name: name.into(),
            version: version.into(),
            package_type: String::new(),
            architecture: String::new(),
            timestamp: DateTime::<Utc>::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_package_type(mut self, package_type: impl Into<String>) -> Self {
        self.package_type = package_type.into();
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns true when the producer did not supply a timestamp.
    ///
    /// Covers both a missing field and Go-style zero times before the epoch.
    pub fn has_unset_timestamp(&self) -> bool {
        self.timestamp.timestamp() <= 0
    }

    /// Numeric ordering key for range queries (Unix seconds).
    pub fn ordering_key(&self) -> i64 {
        self.timestamp.timestamp()
    }

    /// Validates the record and fills in defaults for the log.
    ///
    /// Identifiers are trimmed; an empty `id` becomes a fresh UUID and an
    /// unset `timestamp` becomes `now`.
    pub fn normalize(mut self, now: DateTime<Utc>) -> Result<Self> {
        self.tenant_id = self.tenant_id.trim().to_string();
        self.agent_id = self.agent_id.trim().to_string();

        if self.tenant_id.is_empty() {
            return Err(Error::missing_field("tenant_id"));
        }
        if self.agent_id.is_empty() {
            return Err(Error::missing_field("agent_id"));
        }

        self.validate()
            .map_err(|e| Error::validation(format!("{}", e)))?;

        if self.id.trim().is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        if self.has_unset_timestamp() {
            self.timestamp = now;
        }

        Ok(self)
    }
}
