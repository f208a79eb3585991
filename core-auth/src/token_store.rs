//! Secure Token Storage
//!
//! A [`TokenStorage`] implementation over any platform [`SecureStore`]
//! (Keychain, DPAPI, Secret Service). Tokens are stored under per-provider
//! keys so multiple client instances can coexist in one credential store.
//!
//! # Security
//!
//! - Token values are never logged
//! - Failed operations are reported without exposing stored data

use crate::types::ProviderKind;
use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::storage::{SecureStore, TokenStorage};
use std::sync::Arc;
use tracing::{debug, info};

/// Keychain-backed token persistence, namespaced per provider.
#[derive(Clone)]
pub struct SecureTokenStorage {
    secure_store: Arc<dyn SecureStore>,
    provider: ProviderKind,
}

impl SecureTokenStorage {
    pub fn new(secure_store: Arc<dyn SecureStore>, provider: ProviderKind) -> Self {
        debug!(provider = provider.as_str(), "Initializing SecureTokenStorage");
        Self {
            secure_store,
            provider,
        }
    }

    fn access_key(&self) -> String {
        format!("oauth:{}:access_token", self.provider.as_str())
    }

    fn refresh_key(&self) -> String {
        format!("oauth:{}:refresh_token", self.provider.as_str())
    }

    async fn load(&self, key: &str) -> Result<Option<String>> {
        let Some(bytes) = self.secure_store.get_secret(key).await? else {
            return Ok(None);
        };
        match String::from_utf8(bytes) {
            Ok(token) if !token.is_empty() => Ok(Some(token)),
            // Empty or undecodable entries read as "nothing stored"
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl TokenStorage for SecureTokenStorage {
    async fn load_access_token(&self) -> Result<Option<String>> {
        self.load(&self.access_key()).await
    }

    async fn load_refresh_token(&self) -> Result<Option<String>> {
        self.load(&self.refresh_key()).await
    }

    async fn save_access_token(&self, token: &str) -> Result<()> {
        self.secure_store
            .set_secret(&self.access_key(), token.as_bytes())
            .await?;
        debug!(provider = self.provider.as_str(), "Access token stored");
        Ok(())
    }

    async fn save_refresh_token(&self, token: &str) -> Result<()> {
        self.secure_store
            .set_secret(&self.refresh_key(), token.as_bytes())
            .await?;
        debug!(provider = self.provider.as_str(), "Refresh token stored");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.secure_store.delete_secret(&self.access_key()).await?;
        self.secure_store.delete_secret(&self.refresh_key()).await?;
        info!(provider = self.provider.as_str(), "Stored tokens cleared");
        Ok(())
    }
}
