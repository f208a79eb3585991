//! Credential Persistence and Provider Storage Abstractions
//!
//! Defines the secure credential store, the injected token persistence port,
//! and the per-provider storage capability set the core is parameterized by.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::http::HttpClient;
use std::sync::Arc;

/// Secure credential storage trait
///
/// Abstracts platform secure storage mechanisms:
/// - macOS: Keychain
/// - Windows: DPAPI / Credential Manager
/// - Linux: Secret Service / libsecret
///
/// # Security Requirements
///
/// Implementations MUST encrypt data at rest, use platform-provided secure
/// storage when available, and never log or expose stored values.
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, overwriting any previous value for the key.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value. Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Idempotent: succeeds when the key doesn't exist.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it.
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}

/// Injected persistence port for OAuth tokens.
///
/// The core treats tokens as opaque strings and never interprets their
/// storage medium — the host decides whether they live in the OS keychain,
/// a config file, or anywhere else. `core-auth` ships
/// `SecureTokenStorage`, a ready-made implementation over [`SecureStore`].
///
/// Load operations return `Ok(None)` when no token was ever stored; that is
/// the signal that a fresh interactive login is required.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn load_access_token(&self) -> Result<Option<String>>;

    async fn load_refresh_token(&self) -> Result<Option<String>>;

    async fn save_access_token(&self, token: &str) -> Result<()>;

    async fn save_refresh_token(&self, token: &str) -> Result<()>;

    /// Remove both stored tokens. Called when a refresh is refused and the
    /// stored credentials are known to be dead.
    async fn clear(&self) -> Result<()>;
}

/// A file or folder as reported by the remote provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Provider-issued identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Size in bytes; zero for folders on providers that do not report it
    pub size: u64,
    /// Whether the entry is a folder
    pub is_folder: bool,
    /// Creation timestamp, when the provider reports one
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Last modification timestamp, when the provider reports one
    pub modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Account identity and quota as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub used_space: u64,
    pub total_space: u64,
}

/// Where an upload lands: the parent folder and the file name.
///
/// `folder_id: None` addresses the provider's root folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDestination {
    pub folder_id: Option<String>,
    pub file_name: String,
}

impl UploadDestination {
    pub fn new(folder_id: Option<String>, file_name: impl Into<String>) -> Self {
        Self {
            folder_id,
            file_name: file_name.into(),
        }
    }
}

/// The per-provider capability set.
///
/// Each provider crate supplies exactly one implementation of this trait —
/// the wire calls for its REST surface — and nothing else. The transfer
/// engine and the client facade own every state machine; an adapter must be
/// stateless apart from provider-mandated session bookkeeping.
///
/// # Resumable upload contract
///
/// Large uploads are driven through `session_start` → zero or more
/// `session_append` calls → exactly one `session_finish`. The `cursor`
/// passed to append/finish is always the count of bytes committed by the
/// preceding calls; a provider-side disagreement about that offset is a
/// protocol error, not something an adapter may silently repair. The final
/// bytes of the file always travel with `session_finish` together with the
/// destination metadata — never as a trailing append.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Fixed transfer chunk size for this provider, in bytes.
    fn chunk_size(&self) -> usize;

    /// Account identity and quota.
    async fn account_info(&self) -> Result<AccountInfo>;

    /// Metadata for a single entry.
    async fn entry_metadata(&self, id: &str) -> Result<RemoteEntry>;

    /// Single-level listing of a folder; `None` lists the root.
    async fn list_folder(&self, folder_id: Option<&str>) -> Result<Vec<RemoteEntry>>;

    /// Look up a child folder by name. Returns its id when one exists.
    async fn find_child_folder(
        &self,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<Option<String>>;

    /// Create a folder under the given parent and return its id.
    ///
    /// Idempotence (reusing an existing folder of the same name) is the
    /// facade's job; adapters create unconditionally.
    async fn create_folder(&self, parent_id: Option<&str>, name: &str) -> Result<String>;

    /// Delete a file or folder.
    async fn delete_entry(&self, id: &str) -> Result<()>;

    /// Open the content of a file as a byte stream.
    async fn download_stream(
        &self,
        id: &str,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;

    /// One-shot upload for payloads no larger than one chunk.
    async fn upload_small(&self, dest: &UploadDestination, data: Bytes) -> Result<RemoteEntry>;

    /// Open a resumable upload session with the first chunk.
    ///
    /// `total_size` is the final size of the file; providers that need it up
    /// front (Box, Google Drive) consume it here, others ignore it.
    async fn session_start(
        &self,
        dest: &UploadDestination,
        total_size: u64,
        chunk: Bytes,
    ) -> Result<String>;

    /// Append one non-final chunk at the given committed-byte cursor.
    async fn session_append(&self, session_id: &str, cursor: u64, chunk: Bytes) -> Result<()>;

    /// Commit the session: the final chunk, the cursor it lands at, and the
    /// destination metadata in a single round trip.
    async fn session_finish(
        &self,
        session_id: &str,
        cursor: u64,
        chunk: Bytes,
        dest: &UploadDestination,
    ) -> Result<RemoteEntry>;
}

/// Constructs an authenticated [`StorageAdapter`].
///
/// The facade re-connects through the factory whenever the access token
/// changes (initial login, refresh), so adapters can hold their token
/// immutably.
pub trait AdapterFactory: Send + Sync {
    fn connect(&self, http: Arc<dyn HttpClient>, access_token: &str) -> Arc<dyn StorageAdapter>;
}
