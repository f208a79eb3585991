//! Error types for the Google Drive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// API request returned an error status
    #[error("Google Drive API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),

    /// An upload session PUT returned something other than the expected
    /// 308 continuation or completion status
    #[error("Resumable upload protocol error: {0}")]
    Resumable(String),

    /// Failed to parse an API response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::Api { status, message } => BridgeError::Api { status, message },
            GoogleDriveError::NotFound(id) => BridgeError::NotFound(id),
            GoogleDriveError::Resumable(msg) => BridgeError::Api {
                status: 409,
                message: msg,
            },
            GoogleDriveError::Parse(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GoogleDriveError::Bridge(e) => e,
        }
    }
}
