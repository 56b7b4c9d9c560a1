use thiserror::Error;

/// Top-level error type for CheckDoc.
#[derive(Debug, Error)]
pub enum CheckdocError {
    /// Error from the remote assistant service.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
