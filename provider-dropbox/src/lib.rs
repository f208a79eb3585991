//! # Dropbox Provider
//!
//! Implements the `StorageAdapter` capability set for the Dropbox API v2.
//!
//! ## Overview
//!
//! - PKCE public-client OAuth on a fixed, pre-registered loopback port
//!   (Dropbox requires the exact redirect URL from the app console)
//! - RPC-style JSON endpoints on `api.dropboxapi.com`, content endpoints
//!   with `Dropbox-API-Arg` headers on `content.dropboxapi.com`
//! - Resumable uploads through `upload_session/start`, `append_v2` and
//!   `finish`; the commit metadata travels with the finish call
//! - Token revocation endpoint
//!
//! Entry ids handed to the core are Dropbox paths (`path_display`), which
//! the API accepts everywhere an id is expected.

pub mod adapter;
pub mod error;
pub mod types;

pub use adapter::{DropboxAdapter, DropboxFactory};
pub use error::{DropboxError, Result};

use core_auth::{ClientCredential, OAuthConfig, ProviderKind, RedirectSpec, RevokeEndpoint, RevokeStyle};

/// Dropbox OAuth2 authorization endpoint
const AUTH_URL: &str = "https://www.dropbox.com/oauth2/authorize";

/// Dropbox OAuth2 token endpoint
const TOKEN_URL: &str = "https://api.dropbox.com/oauth2/token";

/// Dropbox token revocation endpoint
const REVOKE_URL: &str = "https://api.dropboxapi.com/2/auth/token/revoke";

/// Transfer chunk size: 100 KiB
pub const CHUNK_SIZE: usize = 100 * 1024;

/// OAuth configuration for a Dropbox public client.
///
/// `redirect_port` is the loopback port registered in the Dropbox app
/// console; its availability is checked before each login attempt.
/// `token_access_type=offline` requests a refresh token alongside the
/// short-lived access token.
pub fn oauth_config(client_id: impl Into<String>, redirect_port: u16) -> OAuthConfig {
    OAuthConfig {
        provider: ProviderKind::Dropbox,
        client_id: client_id.into(),
        credential: ClientCredential::Pkce,
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        revoke: Some(RevokeEndpoint {
            url: REVOKE_URL.to_string(),
            style: RevokeStyle::Bearer,
        }),
        redirect: RedirectSpec::Loopback {
            fixed_port: Some(redirect_port),
        },
        scopes: vec![
            "account_info.read".to_string(),
            "files.content.read".to_string(),
            "files.content.write".to_string(),
        ],
        extra_authorize_params: vec![("token_access_type".to_string(), "offline".to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_config_is_pkce_on_fixed_port() {
        let config = oauth_config("app-key", 8400);
        assert_eq!(config.provider, ProviderKind::Dropbox);
        assert!(config.credential.uses_pkce());
        assert!(matches!(
            config.redirect,
            RedirectSpec::Loopback {
                fixed_port: Some(8400)
            }
        ));
        assert!(config
            .extra_authorize_params
            .iter()
            .any(|(k, v)| k == "token_access_type" && v == "offline"));
        assert_eq!(
            config.revoke.as_ref().map(|r| r.style),
            Some(RevokeStyle::Bearer)
        );
    }
}
