use serde::Deserialize;

use super::error::{ClientError, ClientResult};

/// The slice of an edge chain header the relay cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    hash: [u8; 32],
    number: u64,
}

impl HeaderInfo {
    pub fn new(hash: [u8; 32], number: u64) -> Self {
        Self { hash, number }
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

/// Header object as `eth_getBlockByNumber` returns it, fields we use only.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlockHeader {
    pub hash: String,
    pub number: String,
}

impl TryFrom<RpcBlockHeader> for HeaderInfo {
    type Error = ClientError;

    fn try_from(raw: RpcBlockHeader) -> ClientResult<Self> {
        Ok(Self {
            hash: parse_hash(&raw.hash)?,
            number: parse_quantity(&raw.number)?,
        })
    }
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

fn parse_hash(s: &str) -> ClientResult<[u8; 32]> {
    let bytes = hex::decode(strip_0x(s)).map_err(|e| ClientError::Parse(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ClientError::Parse(format!("header hash is not 32 bytes: {s}")))
}

fn parse_quantity(s: &str) -> ClientResult<u64> {
    u64::from_str_radix(strip_0x(s), 16).map_err(|e| ClientError::Parse(e.to_string()))
}
