//! Durable inventory log for the pipeline.
//!
//! - `StreamLog`: append-only, replayable log (in-memory or Redpanda)
//! - `ConsumerGroup`: exclusive claims with a committed cursor
//! - `EnqueueGate` / `BatchReader`: the producer and consumer edges

pub mod config;
pub mod gate;
pub mod group;
pub mod health;
pub mod log;
pub mod memory;
pub mod offsets;
pub mod reader;
pub mod redpanda;

pub use config::*;
pub use gate::*;
pub use group::*;
pub use log::*;
pub use memory::MemoryLog;
pub use offsets::*;
pub use reader::*;
pub use redpanda::RedpandaLog;
