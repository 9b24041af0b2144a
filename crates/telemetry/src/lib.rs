//! Telemetry for the inventory pipeline.
//!
//! Metrics and health are plain owned structs; the binary creates one of
//! each and hands an `Arc` to every component that reports into it.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
