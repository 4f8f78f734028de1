//! Message-driven relay pipeline between a bitcoin node's publish feeds and
//! an edge chain.
//!
//! The read path decodes raw blocks and surfaces protocol-tagged
//! `OP_RETURN` payloads. The write path treats incoming block-hash frames
//! as ticks: on each accepted tick it fetches the edge chain's latest
//! header, commits `tag || header_hash` into bitcoin through an external
//! transaction-construction step, and records the resulting reference.

pub mod commit;
pub mod extract;
pub mod listener;
pub mod processor;
pub mod reader;
pub mod rpc;
pub mod sub;
pub mod writer;
