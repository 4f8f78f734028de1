use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network: {0}")]
    Network(String),

    #[error("RPC server returned error '{1}' (code {0})")]
    Server(i32, String),

    #[error("Error parsing rpc response: {0}")]
    Parse(String),

    #[error("Error with the HTTP request: {0}")]
    Body(String),

    #[error("HTTP status {0}: {1}")]
    Status(String, String),

    #[error("Malformed response received: {0}")]
    MalformedResponse(String),

    #[error("Could not connect: {0}")]
    Connection(String),

    #[error("Timeout")]
    Timeout,

    #[error("Could not build the request: {0}")]
    ReqBuilder(String),

    #[error("Unexpected HTTP redirect: {0}")]
    HttpRedirect(String),

    #[error("Could not send request after {0} retries")]
    MaxRetriesExceeded(u8),

    #[error("Could not send request: {0}")]
    Request(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}
