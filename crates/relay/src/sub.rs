//! Subscription capability over the bitcoin node's ZMQ publish feeds, and
//! the frame shape they deliver.

use bytes::Bytes;
use thiserror::Error;
use tracing::*;
use zeromq::{Socket, SocketRecv, SubSocket};

/// Topic carrying whole serialized blocks, driving the read path.
pub const RAW_BLOCK_TOPIC: &str = "rawblock";

/// Topic carrying block hashes, driving the write path as a tick source.
pub const HASH_BLOCK_TOPIC: &str = "hashblock";

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("zmq: {0}")]
    Zmq(#[from] zeromq::ZmqError),
}

/// One discrete message from a feed: `[topic, payload, sequence]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    topic: Bytes,
    payload: Bytes,
    sequence: Bytes,
}

impl Frame {
    /// Validates the wire shape. Returns `None` unless the message has
    /// exactly 3 parts; the topic value itself is not checked here.
    pub fn from_parts(parts: Vec<Bytes>) -> Option<Self> {
        match <[Bytes; 3]>::try_from(parts) {
            Ok([topic, payload, sequence]) => Some(Self {
                topic,
                payload,
                sequence,
            }),
            Err(_) => None,
        }
    }

    /// Topic as text, for logging.
    pub fn topic_str(&self) -> String {
        String::from_utf8_lossy(&self.topic).into_owned()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The node's per-topic publish counter, when well-formed (4 bytes LE).
    pub fn sequence_number(&self) -> Option<u32> {
        let arr: [u8; 4] = self.sequence.as_ref().try_into().ok()?;
        Some(u32::from_le_bytes(arr))
    }
}

/// Capability the listen loop needs from a feed: blocking receive of one
/// multipart message.
#[async_trait::async_trait]
pub trait FrameSubscription: Send {
    async fn recv(&mut self) -> Result<Vec<Bytes>, SubscribeError>;
}

/// Subscription over a ZMQ SUB socket. The socket closes when the owning
/// listen loop drops it.
pub struct ZmqSubscription {
    socket: SubSocket,
}

impl ZmqSubscription {
    /// Connects to `endpoint` and subscribes to `topic`.
    pub async fn connect(endpoint: &str, topic: &str) -> Result<Self, SubscribeError> {
        let mut socket = SubSocket::new();

        info!(%endpoint, %topic, "Connecting to zmq socket");
        socket.connect(endpoint).await?;
        socket.subscribe(topic).await?;
        info!(%endpoint, %topic, "Subscribed");

        Ok(Self { socket })
    }
}

#[async_trait::async_trait]
impl FrameSubscription for ZmqSubscription {
    async fn recv(&mut self) -> Result<Vec<Bytes>, SubscribeError> {
        Ok(self.socket.recv().await?.into_vec())
    }
}
