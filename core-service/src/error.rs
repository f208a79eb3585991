use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Client initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Token error: {0}")]
    Token(#[from] core_auth::TokenError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] core_transfer::TransferError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
