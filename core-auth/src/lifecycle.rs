//! Token Lifecycle Management
//!
//! Decides, at client initialization, whether previously persisted
//! credentials are directly usable, need a refresh round trip, or require a
//! fresh interactive login.
//!
//! # Decision table
//!
//! | stored refresh token | stored access token | outcome |
//! |---|---|---|
//! | present | any | refresh; success → `Authenticated`, refusal → `NeedsAuthentication` + stored tokens cleared |
//! | absent | present | `Authenticated` directly (legacy token model, zero network calls) |
//! | absent | absent | `NeedsAuthentication` |
//!
//! The single refresh attempt here is the only automatic retry-like
//! behavior in the whole core; a transient network failure during it
//! propagates as an error (the stored tokens stay untouched for a later
//! attempt), while a provider refusal (`invalid_grant`) clears them.

use crate::error::TokenError;
use crate::types::TokenSet;
use async_trait::async_trait;
use bridge_traits::storage::TokenStorage;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The outcome of the initialization decision.
#[derive(Debug)]
pub enum AuthReadiness {
    /// Stored credentials are usable; the client can talk to the provider.
    Authenticated {
        tokens: TokenSet,
        /// Whether a refresh round trip was performed (false for the
        /// legacy non-expiring token model).
        refreshed: bool,
    },
    /// No usable credentials; an interactive login is required.
    NeedsAuthentication,
}

impl AuthReadiness {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthReadiness::Authenticated { .. })
    }
}

/// The one network capability the lifecycle manager needs: a single-shot
/// token refresh. Implemented by `AuthorizationFlow`.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Refresh an access token. `Err(TokenError::InvalidGrant)` is the
    /// normal "must re-login" refusal; other errors are transient.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, TokenError>;
}

#[async_trait]
impl TokenRefresher for crate::oauth::AuthorizationFlow {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, TokenError> {
        self.refresh_token(refresh_token).await
    }
}

/// Applies the initialization decision table over the injected
/// [`TokenStorage`] port.
pub struct TokenLifecycleManager {
    storage: Arc<dyn TokenStorage>,
    refresher: Arc<dyn TokenRefresher>,
}

impl TokenLifecycleManager {
    pub fn new(storage: Arc<dyn TokenStorage>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { storage, refresher }
    }

    /// Load stored tokens and decide whether they are usable.
    ///
    /// On a successful refresh the new access token is persisted, and the
    /// refresh token is persisted only when the provider returned a new one
    /// — otherwise the stored one is kept and carried forward in the
    /// returned [`TokenSet`].
    ///
    /// # Errors
    ///
    /// Only transient failures (network, storage) error out; a refused
    /// refresh is a normal `NeedsAuthentication` outcome.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<AuthReadiness, TokenError> {
        let access_token = self
            .storage
            .load_access_token()
            .await
            .map_err(|e| TokenError::Storage(e.to_string()))?;
        let refresh_token = self
            .storage
            .load_refresh_token()
            .await
            .map_err(|e| TokenError::Storage(e.to_string()))?;

        if let Some(stored_refresh) = refresh_token {
            return self.refresh_stored(stored_refresh).await;
        }

        if let Some(access) = access_token {
            // Legacy token model: long-lived access token, nothing to
            // refresh, no expiry tracking, zero network calls.
            info!("Restored legacy access token without a network call");
            return Ok(AuthReadiness::Authenticated {
                tokens: TokenSet::legacy(access),
                refreshed: false,
            });
        }

        debug!("No stored tokens; interactive login required");
        Ok(AuthReadiness::NeedsAuthentication)
    }

    async fn refresh_stored(&self, stored_refresh: String) -> Result<AuthReadiness, TokenError> {
        debug!("Attempting refresh of stored tokens");
        match self.refresher.refresh(&stored_refresh).await {
            Ok(mut tokens) => {
                self.storage
                    .save_access_token(&tokens.access_token)
                    .await
                    .map_err(|e| TokenError::Storage(e.to_string()))?;

                match &tokens.refresh_token {
                    Some(new_refresh) => {
                        self.storage
                            .save_refresh_token(new_refresh)
                            .await
                            .map_err(|e| TokenError::Storage(e.to_string()))?;
                    }
                    None => {
                        // The provider rotated nothing; keep using the
                        // stored refresh token.
                        tokens.refresh_token = Some(stored_refresh);
                    }
                }

                info!("Stored session restored via refresh");
                Ok(AuthReadiness::Authenticated {
                    tokens,
                    refreshed: true,
                })
            }
            Err(TokenError::InvalidGrant) => {
                // Normal negative outcome: the grant is dead, so are the
                // stored tokens.
                warn!("Stored refresh token refused; clearing credentials");
                self.storage
                    .clear()
                    .await
                    .map_err(|e| TokenError::Storage(e.to_string()))?;
                Ok(AuthReadiness::NeedsAuthentication)
            }
            Err(e) => Err(e),
        }
    }

    /// Persist a freshly issued token set (after an interactive login).
    pub async fn store_login(&self, tokens: &TokenSet) -> Result<(), TokenError> {
        self.storage
            .save_access_token(&tokens.access_token)
            .await
            .map_err(|e| TokenError::Storage(e.to_string()))?;
        if let Some(refresh) = &tokens.refresh_token {
            self.storage
                .save_refresh_token(refresh)
                .await
                .map_err(|e| TokenError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    /// Clear all persisted credentials.
    pub async fn forget(&self) -> Result<(), TokenError> {
        self.storage
            .clear()
            .await
            .map_err(|e| TokenError::Storage(e.to_string()))
    }
}
