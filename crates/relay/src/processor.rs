//! The processor capability the listen loop dispatches into, and the closed
//! set of relay processors.

use async_trait::async_trait;
use thiserror::Error;

use dalink_db::traits::WriterDatabase;

use crate::{
    commit::{CommitError, Committer},
    reader::ReadProcessor,
    rpc::{error::ClientError, traits::HeaderClient},
    sub::Frame,
    writer::WriteProcessor,
};

/// Why one frame/tick was abandoned. None of these terminate the loop.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("block decode: {0}")]
    Decode(#[from] bitcoin::consensus::encode::Error),

    #[error("edge rpc: {0}")]
    Remote(#[from] ClientError),

    #[error("commit: {0}")]
    Commit(#[from] CommitError),
}

/// Handles one validated frame. Implementations must not block forever;
/// anything slow they call carries its own timeout.
#[async_trait]
pub trait MessageProcessor: Send {
    async fn process(&mut self, frame: &Frame) -> Result<(), ProcessError>;
}

/// The two halves of the relay as a closed set, so call sites stay
/// monomorphic over one concrete processor type per loop.
pub enum RelayProcessor<R, C, D> {
    Read(ReadProcessor),
    Write(WriteProcessor<R, C, D>),
}

#[async_trait]
impl<R, C, D> MessageProcessor for RelayProcessor<R, C, D>
where
    R: HeaderClient,
    C: Committer,
    D: WriterDatabase,
{
    async fn process(&mut self, frame: &Frame) -> Result<(), ProcessError> {
        match self {
            Self::Read(p) => p.process(frame).await,
            Self::Write(p) => p.process(frame).await,
        }
    }
}
