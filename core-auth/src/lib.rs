//! # Authentication Module
//!
//! The OAuth 2.0 authorization core for the storage client.
//!
//! ## Overview
//!
//! This crate owns the two authorization state machines of the system:
//!
//! - [`AuthorizationFlow`](oauth::AuthorizationFlow) — the interactive
//!   login: PKCE/state-validated authorization-code exchange, captured on a
//!   loopback listener or delivered externally by the host
//! - [`TokenLifecycleManager`](lifecycle::TokenLifecycleManager) — the
//!   init-time decision over persisted tokens: refresh, use directly
//!   (legacy model), or require a fresh login
//!
//! Providers supply only an [`OAuthConfig`](oauth::OAuthConfig); every
//! state machine lives here, once.
//!
//! ## Features
//!
//! - PKCE (RFC 7636) with an S256 challenge for public clients
//! - Confidential-client (client secret) exchanges
//! - Single-shot loopback redirect capture with an idempotent stop
//! - External URI-scheme redirect handoff
//! - Refresh with `invalid_grant` as a normal negative outcome
//! - Best-effort token revocation
//! - Token persistence through the injected `TokenStorage` port

pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result, TokenError};
pub use lifecycle::{AuthReadiness, TokenLifecycleManager, TokenRefresher};
pub use listener::{ListenerStopper, RedirectListener};
pub use oauth::{
    parse_redirect_query, AuthSession, AuthorizationFlow, ClientCredential, OAuthConfig,
    PkceVerifier, RedirectQuery, RedirectSpec, RevokeEndpoint, RevokeStyle,
};
pub use token_store::SecureTokenStorage;
pub use types::{FlowState, ProviderKind, TokenSet};
