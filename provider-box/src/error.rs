//! Error types for the Box provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Box provider errors
#[derive(Error, Debug)]
pub enum BoxError {
    /// API request returned an error status
    #[error("Box API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Item does not exist
    #[error("Item not found: {0}")]
    NotFound(String),

    /// The adapter has no record of the upload session
    #[error("Unknown upload session: {0}")]
    UnknownSession(String),

    /// Failed to parse an API response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, BoxError>;

impl From<BoxError> for BridgeError {
    fn from(error: BoxError) -> Self {
        match error {
            BoxError::Api { status, message } => BridgeError::Api { status, message },
            BoxError::NotFound(id) => BridgeError::NotFound(id),
            BoxError::UnknownSession(id) => BridgeError::Api {
                status: 409,
                message: format!("unknown upload session {}", id),
            },
            BoxError::Parse(msg) => BridgeError::OperationFailed(format!("Parse error: {}", msg)),
            BoxError::Bridge(e) => e,
        }
    }
}
