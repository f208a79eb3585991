//! Cloud Client Facade
//!
//! `CloudClient` composes the authorization flow, the token lifecycle
//! manager, the transfer engine and one provider adapter into the uniform
//! operation set a desktop host consumes:
//!
//! Init → Login (or GetAccountInfo) → CreateFolder / Upload / Download /
//! Delete.
//!
//! Every operation returns an [`OpOutcome`] carrying the uniform status
//! taxonomy. Auth state changes are mirrored on the [`EventBus`]; transfer
//! progress stays on the synchronous callback handed to each transfer.
//!
//! One authorization or transfer flow is active per client instance at a
//! time; starting a new login stops any previous loopback listener. Hosts
//! sharing a client across tasks serialize calls themselves.

use crate::outcome::{OpOutcome, OpStatus};
use crate::tree::FolderTree;
use bridge_traits::http::HttpClient;
use bridge_traits::platform::BrowserLauncher;
use bridge_traits::storage::{
    AccountInfo, AdapterFactory, RemoteEntry, StorageAdapter, TokenStorage, UploadDestination,
};
use core_auth::{
    AuthReadiness, AuthorizationFlow, FlowState, OAuthConfig, ProviderKind,
    TokenLifecycleManager, TokenSet,
};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, Receiver, TransferEvent};
use core_transfer::{ProgressSink, TransferEngine, TransferError};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// The host-provided capabilities a client needs.
pub struct ClientDeps {
    pub http: Arc<dyn HttpClient>,
    pub browser: Arc<dyn BrowserLauncher>,
    pub token_storage: Arc<dyn TokenStorage>,
}

impl ClientDeps {
    pub fn new(
        http: Arc<dyn HttpClient>,
        browser: Arc<dyn BrowserLauncher>,
        token_storage: Arc<dyn TokenStorage>,
    ) -> Self {
        Self {
            http,
            browser,
            token_storage,
        }
    }

    /// Default desktop wiring: reqwest HTTP, the system browser, and
    /// keychain-backed token persistence namespaced per provider.
    #[cfg(feature = "desktop")]
    pub fn desktop(provider: ProviderKind) -> Self {
        let secure_store = Arc::new(bridge_desktop::KeyringSecureStore::new());
        Self {
            http: Arc::new(bridge_desktop::ReqwestHttpClient::new()),
            browser: Arc::new(bridge_desktop::SystemBrowser),
            token_storage: Arc::new(core_auth::SecureTokenStorage::new(secure_store, provider)),
        }
    }
}

/// The uniform client over one provider account.
pub struct CloudClient {
    provider: ProviderKind,
    flow: Arc<AuthorizationFlow>,
    lifecycle: TokenLifecycleManager,
    factory: Arc<dyn AdapterFactory>,
    http: Arc<dyn HttpClient>,
    engine: TransferEngine,
    events: EventBus,
    tokens: RwLock<Option<TokenSet>>,
    adapter: RwLock<Option<Arc<dyn StorageAdapter>>>,
}

impl CloudClient {
    /// Build a client from an OAuth configuration and an adapter factory.
    ///
    /// Prefer the provider constructors ([`dropbox`](Self::dropbox),
    /// [`google_drive`](Self::google_drive), [`onedrive`](Self::onedrive),
    /// [`box_com`](Self::box_com)) unless you are wiring a custom provider.
    pub fn new(oauth: OAuthConfig, factory: Arc<dyn AdapterFactory>, deps: ClientDeps) -> Self {
        let provider = oauth.provider;
        let flow = Arc::new(AuthorizationFlow::new(
            oauth,
            deps.http.clone(),
            deps.browser,
        ));
        let lifecycle = TokenLifecycleManager::new(deps.token_storage, flow.clone());

        Self {
            provider,
            flow,
            lifecycle,
            factory,
            http: deps.http,
            engine: TransferEngine::new(),
            events: EventBus::default(),
            tokens: RwLock::new(None),
            adapter: RwLock::new(None),
        }
    }

    /// A Dropbox client (PKCE public client on a fixed loopback port).
    pub fn dropbox(client_id: impl Into<String>, redirect_port: u16, deps: ClientDeps) -> Self {
        Self::new(
            provider_dropbox::oauth_config(client_id, redirect_port),
            Arc::new(provider_dropbox::DropboxFactory),
            deps,
        )
    }

    /// A Google Drive client (confidential client, ephemeral port).
    pub fn google_drive(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        deps: ClientDeps,
    ) -> Self {
        Self::new(
            provider_google_drive::oauth_config(client_id, client_secret),
            Arc::new(provider_google_drive::GoogleDriveFactory),
            deps,
        )
    }

    /// A OneDrive client on an ephemeral loopback port.
    pub fn onedrive(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        deps: ClientDeps,
    ) -> Self {
        Self::new(
            provider_onedrive::oauth_config(client_id, client_secret),
            Arc::new(provider_onedrive::OneDriveFactory),
            deps,
        )
    }

    /// A OneDrive client whose redirect arrives through an OS-registered
    /// URI scheme; drive it with [`login_to_uri`](Self::login_to_uri) and
    /// [`authenticate_from_uri`](Self::authenticate_from_uri).
    pub fn onedrive_external(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
        deps: ClientDeps,
    ) -> Self {
        Self::new(
            provider_onedrive::oauth_config_external(client_id, client_secret, redirect_uri),
            Arc::new(provider_onedrive::OneDriveFactory),
            deps,
        )
    }

    /// A Box client (confidential client, ephemeral port).
    pub fn box_com(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        deps: ClientDeps,
    ) -> Self {
        Self::new(
            provider_box::oauth_config(client_id, client_secret),
            Arc::new(provider_box::BoxFactory),
            deps,
        )
    }

    /// The provider this client talks to.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// The event bus carrying auth and transfer lifecycle events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Current authorization flow state.
    pub fn flow_state(&self) -> FlowState {
        self.flow.flow_state()
    }

    /// Stop any loopback listener. Idempotent, safe when nothing listens,
    /// and the way a host cancels a login that is waiting for a redirect.
    pub fn stop_listen(&self) {
        self.flow.stop_listen();
    }

    fn emit(&self, event: CoreEvent) {
        let _ = self.events.emit(event);
    }

    async fn current_adapter(&self) -> Option<Arc<dyn StorageAdapter>> {
        self.adapter.read().await.clone()
    }

    /// Connect the provider adapter with the given tokens and remember
    /// both.
    async fn install_session(&self, tokens: TokenSet) {
        let adapter = self.factory.connect(self.http.clone(), &tokens.access_token);
        *self.adapter.write().await = Some(adapter);
        *self.tokens.write().await = Some(tokens);
    }

    // ------------------------------------------------------------------
    // Authorization lifecycle
    // ------------------------------------------------------------------

    /// Initialize from persisted credentials: refresh when a refresh token
    /// is stored, use a legacy access token directly, or report that an
    /// interactive login is needed. The one implicit network retry of the
    /// whole facade lives here (the single refresh attempt).
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn init(&self) -> OpOutcome<()> {
        match self.lifecycle.initialize().await {
            Ok(AuthReadiness::Authenticated { tokens, refreshed }) => {
                self.install_session(tokens).await;
                self.emit(CoreEvent::Auth(AuthEvent::SessionRestored {
                    provider: self.provider.to_string(),
                    refreshed,
                }));
                info!("Client initialized from stored credentials");
                OpOutcome::success(())
            }
            Ok(AuthReadiness::NeedsAuthentication) => {
                OpOutcome::status(OpStatus::NeedsAuthentication)
            }
            Err(e) => {
                self.emit(CoreEvent::Auth(AuthEvent::AuthError {
                    provider: self.provider.to_string(),
                    message: e.to_string(),
                    recoverable: true,
                }));
                e.into()
            }
        }
    }

    /// Run the full interactive loopback login, persist the tokens,
    /// connect the adapter, and return the account info.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn login(&self) -> OpOutcome<AccountInfo> {
        self.emit(CoreEvent::Auth(AuthEvent::SigningIn {
            provider: self.provider.to_string(),
        }));

        match self.flow.login().await {
            Ok(tokens) => self.complete_login(tokens).await,
            Err(e) => {
                let recoverable = !matches!(e, core_auth::AuthError::Cancelled);
                self.emit(CoreEvent::Auth(AuthEvent::AuthError {
                    provider: self.provider.to_string(),
                    message: e.to_string(),
                    recoverable,
                }));
                e.into()
            }
        }
    }

    /// Start an external-handoff login and return the `state` the host
    /// must echo into [`authenticate_from_uri`](Self::authenticate_from_uri).
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub fn login_to_uri(&self) -> OpOutcome<String> {
        self.emit(CoreEvent::Auth(AuthEvent::SigningIn {
            provider: self.provider.to_string(),
        }));
        match self.flow.login_to_uri() {
            Ok(state) => OpOutcome::success(state),
            Err(e) => e.into(),
        }
    }

    /// Complete an external-handoff login with the redirect URI the OS
    /// delivered.
    #[instrument(skip(self, uri), fields(provider = %self.provider))]
    pub async fn authenticate_from_uri(&self, state: &str, uri: &str) -> OpOutcome<AccountInfo> {
        match self.flow.process_redirect(state, uri).await {
            Ok(tokens) => self.complete_login(tokens).await,
            Err(e) => {
                self.emit(CoreEvent::Auth(AuthEvent::AuthError {
                    provider: self.provider.to_string(),
                    message: e.to_string(),
                    recoverable: true,
                }));
                e.into()
            }
        }
    }

    async fn complete_login(&self, tokens: TokenSet) -> OpOutcome<AccountInfo> {
        if let Err(e) = self.lifecycle.store_login(&tokens).await {
            return e.into();
        }
        self.install_session(tokens).await;
        self.emit(CoreEvent::Auth(AuthEvent::SignedIn {
            provider: self.provider.to_string(),
        }));
        info!("Login completed");
        self.get_account_info().await
    }

    /// Revoke the current access token (best-effort), clear persisted
    /// credentials, and disconnect the adapter.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn sign_out(&self) -> OpOutcome<()> {
        self.stop_listen();

        if let Some(tokens) = self.tokens.read().await.clone() {
            match self.flow.revoke_token(&tokens.access_token).await {
                Ok(revoked) => info!(revoked = revoked, "Token revocation attempted"),
                Err(e) => warn!("Token revocation failed: {}", e),
            }
        }

        if let Err(e) = self.lifecycle.forget().await {
            return e.into();
        }

        *self.adapter.write().await = None;
        *self.tokens.write().await = None;
        self.emit(CoreEvent::Auth(AuthEvent::SignedOut {
            provider: self.provider.to_string(),
        }));
        OpOutcome::success(())
    }

    // ------------------------------------------------------------------
    // Account and folder operations
    // ------------------------------------------------------------------

    /// Account identity and quota. Requires a connected session.
    pub async fn get_account_info(&self) -> OpOutcome<AccountInfo> {
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };
        match adapter.account_info().await {
            Ok(info) => OpOutcome::success(info),
            Err(e) => e.into(),
        }
    }

    /// Create a folder under `parent_id` (`None` = root), reusing an
    /// existing child of the same name — creation is idempotent.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn create_folder(&self, parent_id: Option<&str>, name: &str) -> OpOutcome<String> {
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };

        match adapter.find_child_folder(parent_id, name).await {
            Ok(Some(existing)) => {
                info!(folder = name, "Reusing existing folder");
                return OpOutcome::success(existing);
            }
            Ok(None) => {}
            Err(e) => return e.into(),
        }

        match adapter.create_folder(parent_id, name).await {
            Ok(id) => OpOutcome::success(id),
            Err(e) => e.into(),
        }
    }

    /// Create every component of a `/`-separated folder path from the
    /// root, reusing levels that already exist. Returns the id of the last
    /// component.
    pub async fn create_folder_path(&self, path: &str) -> OpOutcome<String> {
        let mut parent: Option<String> = None;
        let mut last: Option<String> = None;

        for component in path.split('/').filter(|c| !c.is_empty()) {
            let outcome = self.create_folder(parent.as_deref(), component).await;
            if !outcome.is_success() {
                return outcome;
            }
            match outcome.value {
                Some(id) => {
                    parent = Some(id.clone());
                    last = Some(id);
                }
                None => return OpOutcome::failure(OpStatus::Failed, "folder id missing"),
            }
        }

        match last {
            Some(id) => OpOutcome::success(id),
            None => OpOutcome::failure(OpStatus::Failed, "empty folder path"),
        }
    }

    /// Look up a child folder by name without creating it. A missing
    /// folder is `NotFound`, not a failure.
    pub async fn get_folder_id(&self, parent_id: Option<&str>, name: &str) -> OpOutcome<String> {
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };
        match adapter.find_child_folder(parent_id, name).await {
            Ok(Some(id)) => OpOutcome::success(id),
            Ok(None) => OpOutcome::status(OpStatus::NotFound),
            Err(e) => e.into(),
        }
    }

    /// Resolve a `/`-separated folder path from the root to an id,
    /// without creating anything.
    pub async fn get_folder_id_by_path(&self, path: &str) -> OpOutcome<String> {
        let mut parent: Option<String> = None;
        let mut last: Option<String> = None;

        for component in path.split('/').filter(|c| !c.is_empty()) {
            let outcome = self.get_folder_id(parent.as_deref(), component).await;
            if !outcome.is_success() {
                return outcome;
            }
            match outcome.value {
                Some(id) => {
                    parent = Some(id.clone());
                    last = Some(id);
                }
                None => return OpOutcome::failure(OpStatus::Failed, "folder id missing"),
            }
        }

        match last {
            Some(id) => OpOutcome::success(id),
            None => OpOutcome::status(OpStatus::NotFound),
        }
    }

    /// Single-level folder listing (`None` = root).
    pub async fn list_folder(&self, folder_id: Option<&str>) -> OpOutcome<Vec<RemoteEntry>> {
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };
        match adapter.list_folder(folder_id).await {
            Ok(entries) => OpOutcome::success(entries),
            Err(e) => e.into(),
        }
    }

    /// Metadata for a single entry.
    pub async fn get_file_info(&self, id: &str) -> OpOutcome<RemoteEntry> {
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };
        match adapter.entry_metadata(id).await {
            Ok(entry) => OpOutcome::success(entry),
            Err(e) => e.into(),
        }
    }

    /// Breadth-first snapshot of the folder hierarchy down to `max_depth`
    /// levels, as an index arena.
    pub async fn build_folder_tree(&self, max_depth: usize) -> OpOutcome<FolderTree> {
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };

        let root = RemoteEntry {
            id: String::new(),
            name: String::new(),
            size: 0,
            is_folder: true,
            created_at: None,
            modified_at: None,
        };
        let mut tree = FolderTree::new(root);
        let mut queue: VecDeque<(usize, Option<String>, usize)> =
            VecDeque::from([(tree.root(), None, 0)]);

        while let Some((node, folder_id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let entries = match adapter.list_folder(folder_id.as_deref()).await {
                Ok(entries) => entries,
                Err(e) => return e.into(),
            };
            for entry in entries {
                let is_folder = entry.is_folder;
                let id = entry.id.clone();
                if let Some(child) = tree.insert(node, entry) {
                    if is_folder {
                        queue.push_back((child, Some(id), depth + 1));
                    }
                }
            }
        }

        OpOutcome::success(tree)
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    /// Upload a local file into `folder_id` (`None` = root).
    ///
    /// Progress arrives synchronously per chunk on `progress`;
    /// cancellation is polled once per chunk. A cancelled resumable
    /// session is abandoned remotely (no abort call).
    #[instrument(skip(self, progress, cancel), fields(provider = %self.provider))]
    pub async fn upload_file(
        &self,
        path: &Path,
        folder_id: Option<&str>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> OpOutcome<RemoteEntry> {
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return OpOutcome::failure(OpStatus::Failed, "path has no usable file name");
        };

        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => return OpOutcome::failure(OpStatus::Failed, e.to_string()),
        };
        let total_size = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => return OpOutcome::failure(OpStatus::Failed, e.to_string()),
        };

        let dest = UploadDestination::new(folder_id.map(str::to_string), file_name);
        self.emit(CoreEvent::Transfer(TransferEvent::Started {
            direction: "upload".to_string(),
            target: file_name.to_string(),
            total_bytes: Some(total_size),
        }));

        match self
            .engine
            .upload(adapter.as_ref(), &mut file, total_size, &dest, progress, cancel)
            .await
        {
            Ok(entry) => {
                self.emit(CoreEvent::Transfer(TransferEvent::Completed {
                    direction: "upload".to_string(),
                    target: entry.id.clone(),
                }));
                OpOutcome::success(entry)
            }
            Err(TransferError::Cancelled) => {
                self.emit(CoreEvent::Transfer(TransferEvent::Cancelled {
                    direction: "upload".to_string(),
                    target: file_name.to_string(),
                }));
                TransferError::Cancelled.into()
            }
            Err(e) => {
                self.emit(CoreEvent::Transfer(TransferEvent::Failed {
                    direction: "upload".to_string(),
                    target: file_name.to_string(),
                    message: e.to_string(),
                }));
                e.into()
            }
        }
    }

    /// Download a remote file to `save_path`, returning the byte count.
    ///
    /// A cancelled download leaves the partially written file in place.
    #[instrument(skip(self, progress, cancel), fields(provider = %self.provider))]
    pub async fn download_file(
        &self,
        file_id: &str,
        save_path: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> OpOutcome<u64> {
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };

        let mut file = match tokio::fs::File::create(save_path).await {
            Ok(file) => file,
            Err(e) => return OpOutcome::failure(OpStatus::Failed, e.to_string()),
        };

        self.emit(CoreEvent::Transfer(TransferEvent::Started {
            direction: "download".to_string(),
            target: file_id.to_string(),
            total_bytes: None,
        }));

        match self
            .engine
            .download(adapter.as_ref(), file_id, &mut file, progress, cancel)
            .await
        {
            Ok(total) => {
                self.emit(CoreEvent::Transfer(TransferEvent::Completed {
                    direction: "download".to_string(),
                    target: file_id.to_string(),
                }));
                OpOutcome::success(total)
            }
            Err(TransferError::Cancelled) => {
                self.emit(CoreEvent::Transfer(TransferEvent::Cancelled {
                    direction: "download".to_string(),
                    target: file_id.to_string(),
                }));
                TransferError::Cancelled.into()
            }
            Err(e) => {
                self.emit(CoreEvent::Transfer(TransferEvent::Failed {
                    direction: "download".to_string(),
                    target: file_id.to_string(),
                    message: e.to_string(),
                }));
                e.into()
            }
        }
    }

    /// Delete a remote file or folder.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub async fn delete_file(&self, id: &str) -> OpOutcome<()> {
        if id.is_empty() {
            return OpOutcome::status(OpStatus::NotFound);
        }
        let Some(adapter) = self.current_adapter().await else {
            return OpOutcome::status(OpStatus::NeedsAuthentication);
        };
        match adapter.delete_entry(id).await {
            Ok(()) => OpOutcome::success(()),
            Err(e) => e.into(),
        }
    }
}
