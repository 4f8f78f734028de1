use async_trait::async_trait;

use super::{error::ClientResult, types::HeaderInfo};

/// What the write path needs from the edge chain: its latest header.
#[async_trait]
pub trait HeaderClient: Sync + Send + 'static {
    async fn latest_header(&self) -> ClientResult<HeaderInfo>;
}
