use model::execution::errors::ModelError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Handoff marker not present yet")]
    NotReady,

    #[error("Handoff marker did not appear after {polls} polls")]
    Timeout { polls: usize },

    #[error("Handoff wait cancelled")]
    Cancelled,

    #[error("Failed to read handoff file '{file}': {source}")]
    Read {
        file: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse handoff file '{file}': {source}")]
    Parse {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Application(#[from] ModelError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to encode status record: {0}")]
    Encode(#[from] ModelError),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status store rejected write for '{key}' with HTTP {status}")]
    Rejected { key: String, status: u16 },

    #[error("Status store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum HeartbeatError {
    #[error("Failed to bind heartbeat listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed to resolve heartbeat listener address: {0}")]
    LocalAddr(#[source] io::Error),
}
