//! Shared helpers for the pipeline integration tests.

pub mod containers;
pub mod mocks;
