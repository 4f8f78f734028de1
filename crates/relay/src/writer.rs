//! Write path: tick-driven commitment of the edge chain's latest header.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::*;

use dalink_db::{traits::WriterDatabase, types::RelayRecord};

use crate::{
    commit::Committer,
    processor::{MessageProcessor, ProcessError},
    rpc::traits::HeaderClient,
    sub::Frame,
};

/// Processor for the `hashblock` feed. The frame payload is deliberately
/// ignored; an accepted frame is only a tick saying "a bitcoin block
/// happened". Each tick commits `tag || latest_edge_header_hash`.
pub struct WriteProcessor<R, C, D> {
    tag: Vec<u8>,
    client: Arc<R>,
    committer: C,
    db: Arc<D>,
}

impl<R, C, D> WriteProcessor<R, C, D>
where
    R: HeaderClient,
    C: Committer,
    D: WriterDatabase,
{
    pub fn new(tag: Vec<u8>, client: Arc<R>, committer: C, db: Arc<D>) -> Self {
        Self {
            tag,
            client,
            committer,
            db,
        }
    }
}

#[async_trait]
impl<R, C, D> MessageProcessor for WriteProcessor<R, C, D>
where
    R: HeaderClient,
    C: Committer,
    D: WriterDatabase,
{
    async fn process(&mut self, _frame: &Frame) -> Result<(), ProcessError> {
        let header = self.client.latest_header().await?;
        debug!(number = header.number(), "got latest edge header");

        let mut payload = self.tag.clone();
        payload.extend_from_slice(header.hash());

        let reference = self.committer.commit(&hex::encode(&payload)).await?;
        info!(%reference, number = header.number(), "Committed edge header");

        // The commitment is already on chain at this point. A failed append
        // loses the local record but must not fail the tick.
        let record = RelayRecord::new_now(reference);
        if let Err(e) = self.db.append_record(record) {
            error!(err = %e, "failed to record commitment reference");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use bytes::Bytes;
    use parking_lot::Mutex;

    use dalink_db::stubs::StubWriterDb;

    use super::*;
    use crate::{
        commit::CommitError,
        rpc::{
            error::{ClientError, ClientResult},
            types::HeaderInfo,
        },
    };

    struct FakeHeaderClient {
        fail: bool,
    }

    #[async_trait]
    impl HeaderClient for FakeHeaderClient {
        async fn latest_header(&self) -> ClientResult<HeaderInfo> {
            if self.fail {
                return Err(ClientError::Network("connection refused".to_owned()));
            }
            Ok(HeaderInfo::new([0xaa; 32], 42))
        }
    }

    #[derive(Default)]
    struct FakeCommitter {
        payloads: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Committer for FakeCommitter {
        async fn commit(&self, payload_hex: &str) -> Result<String, CommitError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(CommitError::EmptyReference);
            }
            self.payloads.lock().push(payload_hex.to_owned());
            Ok("txid123".to_owned())
        }
    }

    fn tick_frame() -> Frame {
        Frame::from_parts(vec![
            Bytes::from_static(b"hashblock"),
            Bytes::from_static(b"ignored"),
            Bytes::from(1u32.to_le_bytes().to_vec()),
        ])
        .unwrap()
    }

    fn make_processor(
        client_fails: bool,
        committer: Arc<FakeCommitter>,
        db: Arc<StubWriterDb>,
    ) -> WriteProcessor<FakeHeaderClient, Arc<FakeCommitter>, StubWriterDb> {
        WriteProcessor::new(
            b"DA1".to_vec(),
            Arc::new(FakeHeaderClient { fail: client_fails }),
            committer,
            db,
        )
    }

    #[async_trait]
    impl Committer for Arc<FakeCommitter> {
        async fn commit(&self, payload_hex: &str) -> Result<String, CommitError> {
            (**self).commit(payload_hex).await
        }
    }

    #[tokio::test]
    async fn tick_commits_tag_plus_header_hash_and_records_reference() {
        let committer = Arc::new(FakeCommitter::default());
        let db = Arc::new(StubWriterDb::new());
        let mut proc = make_processor(false, committer.clone(), db.clone());

        proc.process(&tick_frame()).await.unwrap();

        let expected = format!("{}{}", hex::encode(b"DA1"), "aa".repeat(32));
        assert_eq!(committer.payloads.lock().as_slice(), &[expected]);

        let records = db.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference(), "txid123");
    }

    #[tokio::test]
    async fn remote_failure_means_no_commit_and_no_record() {
        let committer = Arc::new(FakeCommitter::default());
        let db = Arc::new(StubWriterDb::new());
        let mut proc = make_processor(true, committer.clone(), db.clone());

        let err = proc.process(&tick_frame()).await.unwrap_err();
        assert!(matches!(err, ProcessError::Remote(_)));
        assert!(committer.payloads.lock().is_empty());
        assert!(db.records().is_empty());
    }

    #[tokio::test]
    async fn commit_failure_means_no_record() {
        let committer = Arc::new(FakeCommitter::default());
        committer.fail.store(true, Ordering::Relaxed);
        let db = Arc::new(StubWriterDb::new());
        let mut proc = make_processor(false, committer.clone(), db.clone());

        let err = proc.process(&tick_frame()).await.unwrap_err();
        assert!(matches!(err, ProcessError::Commit(_)));
        assert!(db.records().is_empty());
    }

    #[tokio::test]
    async fn append_failure_does_not_fail_the_tick() {
        let committer = Arc::new(FakeCommitter::default());
        let db = Arc::new(StubWriterDb::new());
        db.set_fail_appends(true);
        let mut proc = make_processor(false, committer.clone(), db.clone());

        // Commitment succeeded, so the tick reports success.
        proc.process(&tick_frame()).await.unwrap();
        assert_eq!(committer.payloads.lock().len(), 1);
        assert!(db.records().is_empty());
    }
}
