//! Configuration surface for the relay. Loaded from a TOML file at startup
//! and read-only afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default value for `datadir` in [`ClientConfig`].
const DEFAULT_DATADIR: &str = "dalink-data";

/// Default throttle interval applied to a feed when unset.
const DEFAULT_INTERVAL: u64 = 1;

/// Default edge RPC request timeout, in milliseconds.
const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;

/// Default bound on a single commit-script invocation, in milliseconds.
const DEFAULT_COMMIT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("throttle interval for feed `{0}` must be >= 1")]
    ZeroInterval(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(Default))]
pub struct ClientConfig {
    /// The data directory where database contents reside.
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,

    /// For optimistic transactions, how many times to retry if a write fails.
    #[serde(default = "default_db_retry_count")]
    pub db_retry_count: u16,
}

/// ZMQ publish feeds of the bitcoin node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZmqConfig {
    /// Endpoint publishing the `rawblock` topic.
    pub rawblock_endpoint: String,

    /// Endpoint publishing the `hashblock` topic.
    pub hashblock_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Byte prefix marking payloads that belong to us.
    pub protocol_tag: String,

    /// Process every Nth valid frame on the read feed.
    #[serde(default = "default_interval")]
    pub read_interval: u64,

    /// Commit on every Nth valid frame on the write feed.
    #[serde(default = "default_interval")]
    pub write_interval: u64,
}

/// The edge chain whose latest header hash we commit into bitcoin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRpcConfig {
    /// HTTP JSON-RPC endpoint.
    pub http_url: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

/// External transaction-construction step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitterConfig {
    /// Directory holding the commit script.
    pub script_dir: PathBuf,

    /// Path to the bitcoin CLI tool, passed to the script via env.
    pub btc_cli_path: String,

    /// Bound on a single script invocation, in milliseconds.
    #[serde(default = "default_commit_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    pub zmq: ZmqConfig,
    pub relay: RelayConfig,
    pub edge: EdgeRpcConfig,
    pub committer: CommitterConfig,
}

impl Config {
    /// Rejects configs the relay loops cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.read_interval == 0 {
            return Err(ConfigError::ZeroInterval("read"));
        }
        if self.relay.write_interval == 0 {
            return Err(ConfigError::ZeroInterval("write"));
        }
        Ok(())
    }
}

fn default_datadir() -> PathBuf {
    DEFAULT_DATADIR.into()
}

fn default_db_retry_count() -> u16 {
    5
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL
}

fn default_rpc_timeout_ms() -> u64 {
    DEFAULT_RPC_TIMEOUT_MS
}

fn default_commit_timeout_ms() -> u64 {
    DEFAULT_COMMIT_TIMEOUT_MS
}
