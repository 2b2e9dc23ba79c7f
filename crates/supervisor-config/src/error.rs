use thiserror::Error;

/// Errors raised while resolving the supervisor configuration from the
/// handed-off environment map.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable that must be present was not.
    #[error("Missing required variable: {0}")]
    Missing(&'static str),

    /// A variable was present but could not be interpreted.
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Expected exactly {expected} distinct orchestrator ports, got {actual}")]
    PortCount { expected: usize, actual: usize },
}
