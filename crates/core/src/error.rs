//! Unified error types for the inventory pipeline.
//!
//! Error codes:
//! - VALID_001-002: Enqueue input errors
//! - QUEUE_001-003: Log append/read/trim errors
//! - ENRICH_001: Enrichment collaborator errors
//! - STORE_001: Result persistence errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the inventory pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The log rejected or could not accept an append.
    #[error("append error: {0}")]
    Append(String),

    #[error("log read error: {0}")]
    Read(String),

    /// A log entry could not be decoded into a record.
    #[error("malformed entry {entry_id}: {reason}")]
    MalformedEntry { entry_id: u64, reason: String },

    #[error("enrichment error for {name} {version}: {reason}")]
    Enrichment {
        name: String,
        version: String,
        reason: String,
    },

    #[error("persist error: {0}")]
    Persist(String),

    #[error("trim error: {0}")]
    Trim(String),

    #[error("offset store error: {0}")]
    Offset(String),

    #[error("dead letter error: {0}")]
    DeadLetter(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn append(msg: impl Into<String>) -> Self {
        Self::Append(msg.into())
    }

    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    pub fn malformed(entry_id: u64, reason: impl Into<String>) -> Self {
        Self::MalformedEntry {
            entry_id,
            reason: reason.into(),
        }
    }

    pub fn enrichment(
        name: impl Into<String>,
        version: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Enrichment {
            name: name.into(),
            version: version.into(),
            reason: reason.into(),
        }
    }

    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist(msg.into())
    }

    pub fn trim(msg: impl Into<String>) -> Self {
        Self::Trim(msg.into())
    }

    pub fn offset(msg: impl Into<String>) -> Self {
        Self::Offset(msg.into())
    }

    pub fn dead_letter(msg: impl Into<String>) -> Self {
        Self::DeadLetter(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALID_001",
            Self::MissingField(_) => "VALID_001",
            Self::Serialization(_) => "VALID_002",
            Self::Append(_) => "QUEUE_001",
            Self::Read(_) | Self::MalformedEntry { .. } | Self::Offset(_) => "QUEUE_002",
            Self::Trim(_) => "QUEUE_003",
            Self::Enrichment { .. } => "ENRICH_001",
            Self::Persist(_) | Self::DeadLetter(_) => "STORE_001",
            Self::Config(_) | Self::Internal(_) => "INTERNAL",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::MissingField(_) | Self::Serialization(_) => 400,
            Self::Append(_) => 503,
            _ => 500,
        }
    }

    /// Whether retrying the same operation can succeed.
    ///
    /// Input and encoding errors are deterministic; storage and collaborator
    /// failures are not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Append(_)
                | Self::Read(_)
                | Self::Enrichment { .. }
                | Self::Persist(_)
                | Self::Trim(_)
                | Self::DeadLetter(_)
        )
    }
}
