//! JSON-RPC access to the edge chain execution node.

pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::EdgeClient;
