use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Remote entry not found: {0}")]
    NotFound(String),

    #[error("Transfer was cancelled")]
    Cancelled,

    #[error("Upload session protocol error: {0}")]
    SessionProtocolError(String),

    #[error("Size mismatch: expected {expected} bytes, observed {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Local IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BridgeError> for TransferError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::NotFound(id) => TransferError::NotFound(id),
            BridgeError::Api { status: 404, message } => TransferError::NotFound(message),
            // Cursor/offset disagreements surface as conflict or range
            // errors on every supported provider
            BridgeError::Api {
                status: 409 | 412 | 416,
                message,
            } => TransferError::SessionProtocolError(message),
            BridgeError::Api { status, message } => {
                TransferError::Provider(format!("{}: {}", status, message))
            }
            BridgeError::Io(e) => TransferError::Io(e),
            other => TransferError::Provider(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
