use thiserror::Error;

/// Errors of the authorization flow.
///
/// All of these are terminal for the login session they occur in; the
/// caller restarts with a fresh `start`.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Required loopback port {port} is already in use")]
    PortUnavailable { port: u16 },

    #[error("Redirect state did not match the pending login")]
    StateMismatch,

    #[error("Redirect was missing the authorization code or state")]
    MalformedRedirect,

    #[error("Provider denied authorization: {0}")]
    ProviderDenied(String),

    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Authorization flow was cancelled")]
    Cancelled,

    #[error("No login is pending for this client")]
    NoPendingLogin,

    #[error("Redirect listener error: {0}")]
    Listener(String),

    #[error("Failed to open browser: {0}")]
    Browser(String),

    #[error("Invalid authorize URL: {0}")]
    InvalidUrl(String),

    #[error("Login mode does not match the configured redirect: {0}")]
    RedirectMode(String),
}

/// Errors of the token refresh/revoke endpoints.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The provider refused the refresh token. This is the normal
    /// "must re-login" outcome, never retried.
    #[error("Refresh token is no longer valid")]
    InvalidGrant,

    /// Transport failure or an unexpected endpoint response; the body text
    /// is preserved when one was available.
    #[error("Token endpoint failure: {0}")]
    NetworkFailure(String),

    #[error("Token persistence failure: {0}")]
    Storage(String),

    #[error("Malformed token response: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
