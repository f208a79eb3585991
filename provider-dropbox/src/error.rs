//! Error types for the Dropbox provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Dropbox provider errors
#[derive(Error, Debug)]
pub enum DropboxError {
    /// API request returned an error status
    #[error("Dropbox API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse an API response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, DropboxError>;

impl From<DropboxError> for BridgeError {
    fn from(error: DropboxError) -> Self {
        match error {
            DropboxError::Api { status, message } => BridgeError::Api { status, message },
            DropboxError::NotFound(path) => BridgeError::NotFound(path),
            DropboxError::Parse(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            DropboxError::Bridge(e) => e,
        }
    }
}
