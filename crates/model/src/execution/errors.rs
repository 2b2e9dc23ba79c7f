use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unexpected application kind: {0}")]
    UnknownApplication(String),

    #[error("failed to serialize status record: {0}")]
    Serialize(#[from] serde_json::Error),
}
