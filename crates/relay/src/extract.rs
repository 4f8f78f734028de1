//! Extraction of protocol-tagged `OP_RETURN` payloads from decoded blocks.

use bitcoin::{
    blockdata::script::{Instruction, Script},
    Block,
};
use tracing::*;

/// A payload found under the protocol tag, with the tag stripped off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedPayload {
    tag: Vec<u8>,
    data: Vec<u8>,
}

impl TaggedPayload {
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Human-readable `<tag>:<hex(data)>` form used in read-path logs.
    pub fn display_string(&self) -> String {
        format!(
            "{}:{}",
            String::from_utf8_lossy(&self.tag),
            hex::encode(&self.data)
        )
    }
}

/// Returns the push data of the *second* instruction of a script, if the
/// script has one. Commitment outputs are `OP_RETURN <push>`, so the data
/// of interest always sits at instruction index 1.
pub fn push_data_at_index_one(script: &Script) -> Result<Option<Vec<u8>>, bitcoin::blockdata::script::Error> {
    let mut instructions = script.instructions();

    if instructions.next().transpose()?.is_none() {
        return Ok(None);
    }

    match instructions.next().transpose()? {
        Some(Instruction::PushBytes(push)) => Ok(Some(push.as_bytes().to_vec())),
        _ => Ok(None),
    }
}

/// Walks every output of every transaction in the block and collects the
/// payloads whose push data starts with `tag`, tag prefix stripped.
/// Malformed scripts are logged and skipped; they never fail the block.
pub fn extract_tagged_payloads(block: &Block, tag: &[u8]) -> Vec<TaggedPayload> {
    let mut found = Vec::new();

    for tx in &block.txdata {
        for out in &tx.output {
            let data = match push_data_at_index_one(&out.script_pubkey) {
                Ok(Some(data)) => data,
                Ok(None) => continue,
                Err(e) => {
                    warn!(txid = %tx.compute_txid(), err = %e, "skipping malformed script");
                    continue;
                }
            };

            if data.starts_with(tag) {
                found.push(TaggedPayload {
                    tag: tag.to_vec(),
                    data: data[tag.len()..].to_vec(),
                });
            }
        }
    }

    found
}
