//! Plain-file Token Persistence
//!
//! A `TokenStorage` backed by two text files next to each other. Intended
//! for console harnesses and integration tests; production hosts should use
//! the keychain-backed `SecureTokenStorage` from `core-auth`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::TokenStorage,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-based token storage.
///
/// Tokens are stored as `<app_name>_access.txt` and `<app_name>_refresh.txt`
/// inside the chosen directory. Missing files read as "no token stored".
pub struct FileTokenStorage {
    access_path: PathBuf,
    refresh_path: PathBuf,
}

impl FileTokenStorage {
    /// Create a storage rooted in the given directory.
    pub fn new(dir: impl AsRef<Path>, app_name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            access_path: dir.join(format!("{}_access.txt", app_name)),
            refresh_path: dir.join(format!("{}_refresh.txt", app_name)),
        }
    }

    /// Create a storage in the platform data directory
    /// (e.g. `~/.local/share/cumulus` on Linux).
    pub fn in_data_dir(app_name: &str) -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| BridgeError::NotAvailable("No platform data directory".to_string()))?
            .join("cumulus");
        Ok(Self::new(dir, app_name))
    }

    async fn read_token(path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let token = contents.trim().to_string();
                Ok(if token.is_empty() { None } else { Some(token) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_token(path: &Path, token: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, token).await?;
        debug!(file = %path.display(), "Token written");
        Ok(())
    }

    async fn remove_file(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn load_access_token(&self) -> Result<Option<String>> {
        Self::read_token(&self.access_path).await
    }

    async fn load_refresh_token(&self) -> Result<Option<String>> {
        Self::read_token(&self.refresh_path).await
    }

    async fn save_access_token(&self, token: &str) -> Result<()> {
        Self::write_token(&self.access_path, token).await
    }

    async fn save_refresh_token(&self, token: &str) -> Result<()> {
        Self::write_token(&self.refresh_path, token).await
    }

    async fn clear(&self) -> Result<()> {
        Self::remove_file(&self.access_path).await?;
        Self::remove_file(&self.refresh_path).await
    }
}
