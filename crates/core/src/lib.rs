//! Core types, validation, and errors for the inventory pipeline.

pub mod dead_letter;
pub mod error;
pub mod finding;
pub mod limits;
pub mod record;
pub mod result;
pub mod store;

pub use dead_letter::*;
pub use error::{Error, Result};
pub use finding::*;
pub use record::*;
pub use result::*;
pub use store::*;
