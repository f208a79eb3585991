//! # OneDrive Provider
//!
//! Implements the `StorageAdapter` capability set for Microsoft Graph
//! (OneDrive personal and business drives).
//!
//! ## Overview
//!
//! - OAuth against the Microsoft identity platform: PKCE public client by
//!   default, client secret when one is configured, on an ephemeral
//!   loopback port — or through an OS-registered URI scheme delivered by
//!   the host (`oauth_config_external`)
//! - `graph.microsoft.com/v1.0` drive endpoints
//! - Resumable uploads through `createUploadSession` and ranged PUTs to
//!   the pre-authorized upload URL; the final range returns the committed
//!   item
//!
//! Graph requires the file's total size in every `Content-Range`, so the
//! adapter remembers each open session's total — the one piece of
//! provider-mandated session bookkeeping it keeps.

pub mod adapter;
pub mod error;
pub mod types;

pub use adapter::{OneDriveAdapter, OneDriveFactory};
pub use error::{OneDriveError, Result};

use core_auth::{ClientCredential, OAuthConfig, ProviderKind, RedirectSpec};

/// Microsoft identity platform authorization endpoint (common tenant)
const AUTH_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";

/// Microsoft identity platform token endpoint (common tenant)
const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Transfer chunk size: 320 KiB (Graph requires ranges in 320 KiB
/// multiples)
pub const CHUNK_SIZE: usize = 320 * 1024;

/// Default OAuth scopes
fn default_scopes() -> Vec<String> {
    vec![
        "Files.ReadWrite".to_string(),
        "User.Read".to_string(),
        "offline_access".to_string(),
    ]
}

fn credential(client_secret: Option<String>) -> ClientCredential {
    match client_secret {
        Some(secret) => ClientCredential::Secret(secret),
        // Public clients can't send a client secret; PKCE instead
        None => ClientCredential::Pkce,
    }
}

/// OAuth configuration on an ephemeral loopback port.
pub fn oauth_config(
    client_id: impl Into<String>,
    client_secret: Option<String>,
) -> OAuthConfig {
    OAuthConfig {
        provider: ProviderKind::OneDrive,
        client_id: client_id.into(),
        credential: credential(client_secret),
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        revoke: None,
        redirect: RedirectSpec::Loopback { fixed_port: None },
        scopes: default_scopes(),
        extra_authorize_params: Vec::new(),
    }
}

/// OAuth configuration for an OS-registered redirect URI. The host captures
/// the activation and feeds the URI back through the flow's
/// `process_redirect`.
pub fn oauth_config_external(
    client_id: impl Into<String>,
    client_secret: Option<String>,
    redirect_uri: impl Into<String>,
) -> OAuthConfig {
    OAuthConfig {
        provider: ProviderKind::OneDrive,
        client_id: client_id.into(),
        credential: credential(client_secret),
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        revoke: None,
        redirect: RedirectSpec::External {
            uri: redirect_uri.into(),
        },
        scopes: default_scopes(),
        extra_authorize_params: Vec::new(),
    }
}
