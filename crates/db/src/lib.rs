//! Storage interface for the relay's durable state. The only durable entity
//! is the append-only record of successful write-path commitments.

pub mod errors;
pub mod traits;
pub mod types;

#[cfg(feature = "stubs")]
pub mod stubs;

pub use errors::{DbError, DbResult};
