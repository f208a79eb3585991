//! Error types for the OneDrive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// OneDrive provider errors
#[derive(Error, Debug)]
pub enum OneDriveError {
    /// Graph returned an error status
    #[error("Graph API error (status {status}): {message}")]
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

pub type Result<T> = std::result::Result<T, OneDriveError>;

impl From<OneDriveError> for BridgeError {
    fn from(error: OneDriveError) -> Self {
        match error {
            OneDriveError::Api { status, message } => BridgeError::Api { status, message },
            OneDriveError::NotFound(id) => BridgeError::NotFound(id),
            OneDriveError::UnknownSession(id) => BridgeError::Api {
                status: 409,
                message: format!("unknown upload session {}", id),
            },
            OneDriveError::Parse(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            OneDriveError::Bridge(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_session_is_a_protocol_conflict() {
        let bridge: BridgeError = OneDriveError::UnknownSession("url".to_string()).into();
        assert!(matches!(bridge, BridgeError::Api { status: 409, .. }));
    }

    #[test]
    fn test_not_found_mapping() {
        let bridge: BridgeError = OneDriveError::NotFound("item-1".to_string()).into();
        assert!(matches!(bridge, BridgeError::NotFound(_)));
    }
}
