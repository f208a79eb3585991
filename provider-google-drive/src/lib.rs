//! # Google Drive Provider
//!
//! Implements the `StorageAdapter` capability set for the Google Drive API v3.
//!
//! ## Overview
//!
//! - Confidential-client OAuth (client secret) on an ephemeral loopback port
//! - `drive/v3` file and about endpoints
//! - Single-shot uploads as one `multipart/related` request
//! - Resumable uploads through the upload URL returned by
//!   `uploadType=resumable`: the URL itself is the session id, chunks go up
//!   as `Content-Range` PUTs answered with 308 until the final range
//!
//! The destination metadata (name, parent) is carried at session start —
//! Google fixes it when the upload URL is minted.

pub mod adapter;
pub mod error;
pub mod types;

pub use adapter::{GoogleDriveAdapter, GoogleDriveFactory};
pub use error::{GoogleDriveError, Result};

use core_auth::{ClientCredential, OAuthConfig, ProviderKind, RedirectSpec, RevokeEndpoint, RevokeStyle};

/// Google OAuth2 authorization endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth2 token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google OAuth2 revocation endpoint
const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Transfer chunk size: 256 KiB (a multiple of Google's 256 KiB upload
/// granularity)
pub const CHUNK_SIZE: usize = 256 * 1024;

/// OAuth configuration for a Google Drive confidential client.
///
/// `access_type=offline` plus `prompt=consent` makes Google return a
/// refresh token on every authorization, not only the first one.
pub fn oauth_config(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
) -> OAuthConfig {
    OAuthConfig {
        provider: ProviderKind::GoogleDrive,
        client_id: client_id.into(),
        credential: ClientCredential::Secret(client_secret.into()),
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        revoke: Some(RevokeEndpoint {
            url: REVOKE_URL.to_string(),
            style: RevokeStyle::ClientForm,
        }),
        redirect: RedirectSpec::Loopback { fixed_port: None },
        scopes: vec![
            "https://www.googleapis.com/auth/drive.file".to_string(),
            "https://www.googleapis.com/auth/userinfo.email".to_string(),
            "https://www.googleapis.com/auth/userinfo.profile".to_string(),
        ],
        extra_authorize_params: vec![
            ("access_type".to_string(), "offline".to_string()),
            ("prompt".to_string(), "consent".to_string()),
        ],
    }
}
