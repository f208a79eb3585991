//! Dropbox API v2 adapter implementation
//!
//! Implements the `StorageAdapter` capability set over the injected
//! `HttpClient`. RPC endpoints live on `api.dropboxapi.com` and take JSON
//! bodies; content endpoints live on `content.dropboxapi.com` and take the
//! JSON argument in the `Dropbox-API-Arg` header with an octet-stream body.

use crate::error::{DropboxError, Result};
use crate::types::{
    FullAccount, ListFolderContinueArg, ListFolderResponse, Metadata, MetadataWrapper,
    SpaceUsage, UploadSessionStartResponse,
};
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    AccountInfo, AdapterFactory, RemoteEntry, StorageAdapter, UploadDestination,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

/// RPC API base URL
const API_BASE: &str = "https://api.dropboxapi.com/2";

/// Content API base URL
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Dropbox API v2 adapter.
pub struct DropboxAdapter {
    http: Arc<dyn HttpClient>,
    access_token: String,
}

impl DropboxAdapter {
    pub fn new(http: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self { http, access_token }
    }

    /// The path an upload lands on. Root-level destinations get a leading
    /// slash; folder ids are themselves paths.
    fn dest_path(dest: &UploadDestination) -> String {
        match &dest.folder_id {
            Some(folder) => format!("{}/{}", folder.trim_end_matches('/'), dest.file_name),
            None => format!("/{}", dest.file_name),
        }
    }

    fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
        value
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn convert(meta: Metadata) -> RemoteEntry {
        let modified = Self::parse_time(meta.server_modified.as_deref());
        let created = Self::parse_time(meta.client_modified.as_deref());
        let is_folder = meta.is_folder();
        RemoteEntry {
            id: meta
                .path_display
                .or(meta.id)
                .unwrap_or_else(|| meta.name.clone()),
            name: meta.name,
            size: meta.size.unwrap_or(0),
            is_folder,
            created_at: created,
            modified_at: modified,
        }
    }

    fn api_error(response: &HttpResponse) -> DropboxError {
        let message = response.text().unwrap_or_default();
        // Dropbox reports missing paths as a 409 conflict with a
        // path/not_found summary
        if message.contains("not_found") {
            DropboxError::NotFound(message)
        } else {
            DropboxError::Api {
                status: response.status,
                message,
            }
        }
    }

    /// POST a JSON body to an RPC endpoint and parse the JSON reply.
    async fn rpc<T: DeserializeOwned>(&self, endpoint: &str, arg: &impl Serialize) -> Result<T> {
        let request = HttpRequest::new(HttpMethod::Post, format!("{}{}", API_BASE, endpoint))
            .bearer_token(&self.access_token)
            .json(arg)?;

        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(Self::api_error(&response));
        }
        response.json().map_err(|e| DropboxError::Parse(e.to_string()))
    }

    fn content_request(
        &self,
        endpoint: &str,
        arg: &impl Serialize,
        body: Bytes,
    ) -> Result<HttpRequest> {
        let arg_json = serde_json::to_string(arg)
            .map_err(|e| DropboxError::Parse(format!("Failed to encode API arg: {}", e)))?;
        Ok(
            HttpRequest::new(HttpMethod::Post, format!("{}{}", CONTENT_BASE, endpoint))
                .bearer_token(&self.access_token)
                .header("Dropbox-API-Arg", arg_json)
                .header("Content-Type", "application/octet-stream")
                .body(body),
        )
    }

    /// POST bytes to a content endpoint and parse the JSON reply.
    async fn content_call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        arg: &impl Serialize,
        body: Bytes,
    ) -> Result<T> {
        let request = self.content_request(endpoint, arg, body)?;
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(Self::api_error(&response));
        }
        response.json().map_err(|e| DropboxError::Parse(e.to_string()))
    }

    /// POST bytes to a content endpoint, discarding the reply body.
    async fn content_call_unit(
        &self,
        endpoint: &str,
        arg: &impl Serialize,
        body: Bytes,
    ) -> Result<()> {
        let request = self.content_request(endpoint, arg, body)?;
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(Self::api_error(&response));
        }
        Ok(())
    }

    fn root_or(folder_id: Option<&str>) -> String {
        folder_id.unwrap_or("").to_string()
    }
}

#[async_trait]
impl StorageAdapter for DropboxAdapter {
    fn chunk_size(&self) -> usize {
        crate::CHUNK_SIZE
    }

    #[instrument(skip(self))]
    async fn account_info(&self) -> BridgeResult<AccountInfo> {
        let account: FullAccount = self
            .rpc("/users/get_current_account", &serde_json::Value::Null)
            .await?;
        let usage: SpaceUsage = self
            .rpc("/users/get_space_usage", &serde_json::Value::Null)
            .await?;

        Ok(AccountInfo {
            user_name: Some(account.name.display_name),
            user_email: Some(account.email),
            used_space: usage.used,
            total_space: usage.allocation.allocated.unwrap_or(0),
        })
    }

    #[instrument(skip(self))]
    async fn entry_metadata(&self, id: &str) -> BridgeResult<RemoteEntry> {
        let meta: Metadata = self
            .rpc("/files/get_metadata", &json!({ "path": id }))
            .await?;
        Ok(Self::convert(meta))
    }

    #[instrument(skip(self))]
    async fn list_folder(&self, folder_id: Option<&str>) -> BridgeResult<Vec<RemoteEntry>> {
        let mut page: ListFolderResponse = self
            .rpc(
                "/files/list_folder",
                &json!({ "path": Self::root_or(folder_id), "recursive": false }),
            )
            .await?;

        let mut entries: Vec<RemoteEntry> =
            page.entries.drain(..).map(Self::convert).collect();

        while page.has_more {
            page = self
                .rpc(
                    "/files/list_folder/continue",
                    &ListFolderContinueArg {
                        cursor: page.cursor.clone(),
                    },
                )
                .await?;
            entries.extend(page.entries.drain(..).map(Self::convert));
        }

        debug!(count = entries.len(), "Listed folder");
        Ok(entries)
    }

    async fn find_child_folder(
        &self,
        parent_id: Option<&str>,
        name: &str,
    ) -> BridgeResult<Option<String>> {
        let entries = self.list_folder(parent_id).await?;
        Ok(entries
            .into_iter()
            .find(|e| e.is_folder && e.name == name)
            .map(|e| e.id))
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, parent_id: Option<&str>, name: &str) -> BridgeResult<String> {
        let path = format!("{}/{}", Self::root_or(parent_id), name);
        let created: MetadataWrapper = self
            .rpc(
                "/files/create_folder_v2",
                &json!({ "path": path, "autorename": false }),
            )
            .await?;
        Ok(created
            .metadata
            .path_display
            .unwrap_or(path))
    }

    #[instrument(skip(self))]
    async fn delete_entry(&self, id: &str) -> BridgeResult<()> {
        let _deleted: MetadataWrapper =
            self.rpc("/files/delete_v2", &json!({ "path": id })).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download_stream(
        &self,
        id: &str,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let arg_json = serde_json::to_string(&json!({ "path": id }))
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files/download", CONTENT_BASE),
        )
        .bearer_token(&self.access_token)
        .header("Dropbox-API-Arg", arg_json);

        match self.http.execute_streaming(request).await {
            Ok(stream) => Ok(stream),
            Err(BridgeError::Api { status, message }) if message.contains("not_found") => {
                Err(BridgeError::NotFound(format!("{}: {}", status, message)))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, data), fields(len = data.len()))]
    async fn upload_small(
        &self,
        dest: &UploadDestination,
        data: Bytes,
    ) -> BridgeResult<RemoteEntry> {
        let meta: Metadata = self
            .content_call(
                "/files/upload",
                &json!({
                    "path": Self::dest_path(dest),
                    "mode": "overwrite",
                    "autorename": false,
                    "mute": true
                }),
                data,
            )
            .await?;
        Ok(Self::convert(meta))
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_start(
        &self,
        _dest: &UploadDestination,
        _total_size: u64,
        chunk: Bytes,
    ) -> BridgeResult<String> {
        let started: UploadSessionStartResponse = self
            .content_call("/files/upload_session/start", &json!({ "close": false }), chunk)
            .await?;
        Ok(started.session_id)
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_append(
        &self,
        session_id: &str,
        cursor: u64,
        chunk: Bytes,
    ) -> BridgeResult<()> {
        self.content_call_unit(
            "/files/upload_session/append_v2",
            &json!({
                "cursor": { "session_id": session_id, "offset": cursor },
                "close": false
            }),
            chunk,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_finish(
        &self,
        session_id: &str,
        cursor: u64,
        chunk: Bytes,
        dest: &UploadDestination,
    ) -> BridgeResult<RemoteEntry> {
        // The commit metadata and the final bytes travel together
        let meta: Metadata = self
            .content_call(
                "/files/upload_session/finish",
                &json!({
                    "cursor": { "session_id": session_id, "offset": cursor },
                    "commit": {
                        "path": Self::dest_path(dest),
                        "mode": "overwrite",
                        "autorename": false,
                        "mute": true
                    }
                }),
                chunk,
            )
            .await?;
        Ok(Self::convert(meta))
    }
}

/// Connects authenticated [`DropboxAdapter`] instances.
pub struct DropboxFactory;

impl AdapterFactory for DropboxFactory {
    fn connect(&self, http: Arc<dyn HttpClient>, access_token: &str) -> Arc<dyn StorageAdapter> {
        Arc::new(DropboxAdapter::new(http, access_token.to_string()))
    }
}
