// Error types for fetch cycles and chart sessions
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("data server {server} answered {status}: {body}")]
    Status {
        server: String,
        status: u16,
        body: String,
    },

    #[error("request to data server {server} failed")]
    Transport {
        server: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from data server {server}")]
    Decode {
        server: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no data server configured for id {0:?}")]
    UnknownServer(String),

    #[error("invalid source path {0:?}")]
    InvalidPath(Vec<String>),

    #[error("time window out of range: {0}")]
    WindowOutOfRange(String),

    #[error("data server {server} sent out-of-range timestamp {t}")]
    TimestampOutOfRange { server: String, t: i64 },

    #[error("fetch cycle was cancelled")]
    Cancelled,
}

/// Why a render request produced no frame.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("superseded by a newer render request")]
    Superseded,

    #[error("fetch cycle failed: {0}")]
    Failed(String),

    #[error("chart has not been rendered yet")]
    NotRendered,

    #[error("render worker is no longer running")]
    WorkerGone,
}
