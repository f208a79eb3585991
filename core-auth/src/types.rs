use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported cloud storage providers.
///
/// Each provider has its own OAuth 2.0 configuration, API endpoints and
/// transfer chunk size.
///
/// # Examples
///
/// ```
/// use core_auth::ProviderKind;
///
/// let provider = ProviderKind::Dropbox;
/// assert_eq!(provider.display_name(), "Dropbox");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Dropbox cloud storage
    Dropbox,
    /// Google Drive cloud storage
    GoogleDrive,
    /// Microsoft OneDrive cloud storage
    OneDrive,
    /// Box cloud storage
    Box,
}

impl ProviderKind {
    /// Get the human-readable display name for this provider
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Dropbox => "Dropbox",
            ProviderKind::GoogleDrive => "Google Drive",
            ProviderKind::OneDrive => "OneDrive",
            ProviderKind::Box => "Box",
        }
    }

    /// Get the provider identifier string, used for logging and storage keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Dropbox => "dropbox",
            ProviderKind::GoogleDrive => "google_drive",
            ProviderKind::OneDrive => "onedrive",
            ProviderKind::Box => "box",
        }
    }

    /// Parse a provider kind from a string identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use core_auth::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::parse("dropbox"), Some(ProviderKind::Dropbox));
    /// assert_eq!(ProviderKind::parse("invalid"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dropbox" => Some(ProviderKind::Dropbox),
            "google_drive" | "googledrive" => Some(ProviderKind::GoogleDrive),
            "onedrive" | "one_drive" => Some(ProviderKind::OneDrive),
            "box" => Some(ProviderKind::Box),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// OAuth 2.0 token set.
///
/// The refresh token is absent in the legacy token model (a long-lived
/// access token that needs no refresh step). The expiry is absent when the
/// token does not expire or the provider did not report a lifetime — it is
/// never guessed.
///
/// # Security
///
/// The `Debug` implementation redacts both token values.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// The access token used for API requests
    pub access_token: String,
    /// The refresh token, when the provider issued one
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC), when the provider reported it
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Create a token set from a token endpoint response.
    ///
    /// `expires_in` is the lifetime in seconds as reported by the provider;
    /// `None` leaves the expiry unset.
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }

    /// A legacy token set: long-lived access token, no refresh, no expiry.
    pub fn legacy(access_token: String) -> Self {
        Self {
            access_token,
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Whether this token set carries a refresh token.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Check if the access token is expired or expires within the buffer.
    ///
    /// A token without a recorded expiry is never considered expired.
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                Utc::now() >= expires_at - chrono::Duration::seconds(buffer_seconds)
            }
            None => false,
        }
    }

    /// Check expiry with the default 5 minute buffer.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(300)
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authorization flow state.
///
/// # State Transitions
///
/// ```text
/// Idle -> Listening -> AwaitingRedirect -> Exchanging -> Authenticated
///                            |                  |
///                            v                  v
///                        Cancelled           Failed
/// ```
///
/// The external-handoff path skips `Listening` (there is no local
/// listener) and parks in `AwaitingRedirect` until the host delivers the
/// redirect URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FlowState {
    /// No login attempt in progress
    #[default]
    Idle,
    /// Loopback listener bound, browser about to open
    Listening,
    /// Waiting for the provider to redirect back
    AwaitingRedirect,
    /// Exchanging the authorization code for tokens
    Exchanging,
    /// Tokens obtained
    Authenticated,
    /// The flow ended in an error
    Failed,
    /// The flow was stopped before a redirect arrived
    Cancelled,
}

impl FlowState {
    /// Whether a login attempt is currently underway.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            FlowState::Listening | FlowState::AwaitingRedirect | FlowState::Exchanging
        )
    }

    /// Whether the flow reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Authenticated | FlowState::Failed | FlowState::Cancelled
        )
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FlowState::Idle => "idle",
            FlowState::Listening => "listening",
            FlowState::AwaitingRedirect => "awaiting redirect",
            FlowState::Exchanging => "exchanging code",
            FlowState::Authenticated => "authenticated",
            FlowState::Failed => "failed",
            FlowState::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_provider_kind_display_name() {
        assert_eq!(ProviderKind::Dropbox.display_name(), "Dropbox");
        assert_eq!(ProviderKind::GoogleDrive.display_name(), "Google Drive");
        assert_eq!(ProviderKind::OneDrive.display_name(), "OneDrive");
        assert_eq!(ProviderKind::Box.display_name(), "Box");
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("dropbox"), Some(ProviderKind::Dropbox));
        assert_eq!(
            ProviderKind::parse("GoogleDrive"),
            Some(ProviderKind::GoogleDrive)
        );
        assert_eq!(
            ProviderKind::parse("one_drive"),
            Some(ProviderKind::OneDrive)
        );
        assert_eq!(ProviderKind::parse("box"), Some(ProviderKind::Box));
        assert_eq!(ProviderKind::parse("invalid"), None);
    }

    #[test]
    fn test_token_set_with_expiry() {
        let tokens = TokenSet::new("access".to_string(), Some("refresh".to_string()), Some(3600));
        assert!(tokens.has_refresh_token());
        assert!(tokens.expires_at.is_some());
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_token_set_without_expiry_never_expires() {
        let tokens = TokenSet::new("access".to_string(), None, None);
        assert!(tokens.expires_at.is_none());
        assert!(!tokens.is_expired());
        assert!(!tokens.is_expired_with_buffer(i64::MAX / 2));
    }

    #[test]
    fn test_legacy_token_set() {
        let tokens = TokenSet::legacy("long-lived".to_string());
        assert!(!tokens.has_refresh_token());
        assert!(tokens.expires_at.is_none());
    }

    #[test]
    fn test_token_set_expired_within_buffer() {
        let tokens = TokenSet {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::seconds(200)),
        };
        // Default buffer is 5 minutes
        assert!(tokens.is_expired());
        assert!(!tokens.is_expired_with_buffer(60));
    }

    #[test]
    fn test_token_set_debug_redacts() {
        let tokens = TokenSet::new(
            "secret_access".to_string(),
            Some("secret_refresh".to_string()),
            Some(3600),
        );
        let debug_str = format!("{:?}", tokens);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret_access"));
        assert!(!debug_str.contains("secret_refresh"));
    }

    #[test]
    fn test_flow_state_transitions() {
        assert!(!FlowState::Idle.is_in_progress());
        assert!(FlowState::Listening.is_in_progress());
        assert!(FlowState::AwaitingRedirect.is_in_progress());
        assert!(FlowState::Exchanging.is_in_progress());
        assert!(FlowState::Authenticated.is_terminal());
        assert!(FlowState::Failed.is_terminal());
        assert!(FlowState::Cancelled.is_terminal());
        assert_eq!(FlowState::default(), FlowState::Idle);
    }
}
