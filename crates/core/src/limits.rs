//! Size limits for inventory ingestion.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated on `InventoryRecord`. Keep both in sync.

/// Maximum request payload size in bytes (1MB).
pub const MAX_PAYLOAD_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum records per ingest request.
pub const MAX_BATCH_RECORDS: usize = 1000;

/// Tenant and agent identifier max length.
pub const MAX_ID_LEN: usize = 128;

/// Package name max length.
pub const MAX_NAME_LEN: usize = 512;

/// Version string max length.
pub const MAX_VERSION_LEN: usize = 128;
