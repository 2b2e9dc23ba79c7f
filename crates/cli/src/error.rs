use std::path::PathBuf;
use supervisor_core::error::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to open status store at {}: {source}", path.display())]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    #[error("Failed to read status: {0}")]
    Store(#[from] StoreError),

    #[error("No status recorded under '{0}'")]
    NoStatus(String),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),
}
