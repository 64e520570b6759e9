//! Error types for Vitae.

use thiserror::Error;

/// Core error type for Vitae operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using Vitae's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
