//! Read path: decode raw-block frames and surface tagged payloads.

use async_trait::async_trait;
use bitcoin::{consensus::deserialize, Block};
use tracing::*;

use crate::{
    extract::extract_tagged_payloads,
    processor::{MessageProcessor, ProcessError},
    sub::Frame,
};

/// Processor for the `rawblock` feed. Stateless beyond the tag it scans for.
pub struct ReadProcessor {
    tag: Vec<u8>,
}

impl ReadProcessor {
    pub fn new(tag: Vec<u8>) -> Self {
        Self { tag }
    }
}

#[async_trait]
impl MessageProcessor for ReadProcessor {
    async fn process(&mut self, frame: &Frame) -> Result<(), ProcessError> {
        debug!(topic = %frame.topic_str(), "decoding block frame");

        // Strict consensus decode; trailing garbage is an error too.
        let block: Block = deserialize(frame.payload())?;

        let payloads = extract_tagged_payloads(&block, &self.tag);
        let rendered: Vec<String> = payloads.iter().map(|p| p.display_string()).collect();
        info!(block = %block.block_hash(), payloads = ?rendered, "Relayer read");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{
        absolute,
        block::{Header, Version},
        consensus::serialize,
        hashes::Hash,
        opcodes::all::OP_RETURN,
        script::{Builder, PushBytesBuf},
        transaction, Amount, BlockHash, CompactTarget, OutPoint, ScriptBuf, Sequence, Transaction,
        TxIn, TxMerkleNode, TxOut, Witness,
    };
    use bytes::Bytes;

    use super::*;

    fn test_block(tagged: &[u8]) -> Block {
        let push = PushBytesBuf::try_from(tagged.to_vec()).unwrap();
        let script = Builder::new()
            .push_opcode(OP_RETURN)
            .push_slice(push)
            .into_script();

        Block {
            header: Header {
                version: Version::TWO,
                prev_blockhash: BlockHash::all_zeros(),
                merkle_root: TxMerkleNode::all_zeros(),
                time: 1_700_000_000,
                bits: CompactTarget::from_consensus(0x1d00ffff),
                nonce: 7,
            },
            txdata: vec![Transaction {
                version: transaction::Version::TWO,
                lock_time: absolute::LockTime::ZERO,
                // Zero-input transactions do not round-trip through consensus
                // encoding, so give it a dummy input.
                input: vec![TxIn {
                    previous_output: OutPoint::null(),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                }],
                output: vec![TxOut {
                    value: Amount::ZERO,
                    script_pubkey: script,
                }],
            }],
        }
    }

    fn frame_with_payload(payload: Vec<u8>) -> Frame {
        Frame::from_parts(vec![
            Bytes::from_static(b"rawblock"),
            Bytes::from(payload),
            Bytes::from(1u32.to_le_bytes().to_vec()),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn well_formed_block_frame_is_processed() {
        let mut tagged = b"DA1".to_vec();
        tagged.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let block = test_block(&tagged);

        let frame = frame_with_payload(serialize(&block));
        let mut proc = ReadProcessor::new(b"DA1".to_vec());
        assert!(proc.process(&frame).await.is_ok());
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_decode_error() {
        let frame = frame_with_payload(vec![0x01, 0x02, 0x03]);
        let mut proc = ReadProcessor::new(b"DA1".to_vec());

        let err = proc.process(&frame).await.unwrap_err();
        assert!(matches!(err, ProcessError::Decode(_)));
    }

    #[test]
    fn serialized_block_round_trips() {
        let block = test_block(b"DA1x");
        let bytes = serialize(&block);
        let decoded: Block = deserialize(&bytes).unwrap();
        assert_eq!(decoded.block_hash(), block.block_hash());
        assert_eq!(decoded.txdata.len(), 1);
    }
}
