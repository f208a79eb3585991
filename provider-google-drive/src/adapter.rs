//! Google Drive API v3 adapter implementation
//!
//! Implements the `StorageAdapter` capability set over the injected
//! `HttpClient`. Metadata calls go to `drive/v3`; uploads go to the
//! separate upload endpoint, either as one `multipart/related` request or
//! through a resumable upload URL.

use crate::error::{GoogleDriveError, Result};
use crate::types::{
    AboutResponse, DriveFile, FileMetadata, FilesListResponse, FOLDER_MIME_TYPE,
};
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    AccountInfo, AdapterFactory, RemoteEntry, StorageAdapter, UploadDestination,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload endpoint base URL
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,modifiedTime";

/// Boundary for multipart/related single-shot uploads
const MULTIPART_BOUNDARY: &str = "cumulus_upload_boundary";

/// Google Drive API v3 adapter.
pub struct GoogleDriveAdapter {
    http: Arc<dyn HttpClient>,
    access_token: String,
}

impl GoogleDriveAdapter {
    pub fn new(http: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self { http, access_token }
    }

    fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
        value
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn convert(file: DriveFile) -> RemoteEntry {
        RemoteEntry {
            is_folder: file.is_folder(),
            size: file.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
            created_at: Self::parse_time(file.created_time.as_deref()),
            modified_at: Self::parse_time(file.modified_time.as_deref()),
            id: file.id,
            name: file.name,
        }
    }

    fn check(response: HttpResponse, context: &str) -> Result<HttpResponse> {
        if response.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        if response.status == 404 {
            Err(GoogleDriveError::NotFound(format!("{}: {}", context, message)))
        } else {
            Err(GoogleDriveError::Api {
                status: response.status,
                message,
            })
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let request = HttpRequest::new(HttpMethod::Get, url).bearer_token(&self.access_token);
        let response = self.http.execute(request).await?;
        let response = Self::check(response, "GET")?;
        response
            .json()
            .map_err(|e| GoogleDriveError::Parse(e.to_string()))
    }

    fn parent_or_root(folder_id: Option<&str>) -> &str {
        folder_id.unwrap_or("root")
    }

    /// Drive query strings quote names in single quotes; escape accordingly.
    fn escape_query_value(value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }

    /// Assemble a `multipart/related` body: JSON metadata part followed by
    /// the content part.
    fn multipart_body(metadata_json: &str, data: &Bytes) -> Bytes {
        let mut body = Vec::with_capacity(metadata_json.len() + data.len() + 256);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n\
                 --{b}\r\nContent-Type: application/octet-stream\r\n\r\n",
                b = MULTIPART_BOUNDARY,
                m = metadata_json
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--", MULTIPART_BOUNDARY).as_bytes());
        Bytes::from(body)
    }

    fn upload_metadata(dest: &UploadDestination) -> FileMetadata {
        FileMetadata {
            name: dest.file_name.clone(),
            mime_type: None,
            parents: vec![Self::parent_or_root(dest.folder_id.as_deref()).to_string()],
        }
    }

    /// PUT one chunk of a resumable session. `total` is `Some` only on the
    /// final chunk; intermediate chunks use the open-ended `*` form and
    /// must be answered with 308.
    async fn put_chunk(
        &self,
        upload_url: &str,
        cursor: u64,
        chunk: Bytes,
        total: Option<u64>,
    ) -> Result<HttpResponse> {
        let end = cursor + chunk.len() as u64 - 1;
        let range = match total {
            Some(total) => format!("bytes {}-{}/{}", cursor, end, total),
            None => format!("bytes {}-{}/*", cursor, end),
        };

        let request = HttpRequest::new(HttpMethod::Put, upload_url.to_string())
            .bearer_token(&self.access_token)
            .header("Content-Range", range)
            .header("Content-Type", "application/octet-stream")
            .body(chunk);

        Ok(self.http.execute(request).await?)
    }
}

#[async_trait]
impl StorageAdapter for GoogleDriveAdapter {
    fn chunk_size(&self) -> usize {
        crate::CHUNK_SIZE
    }

    #[instrument(skip(self))]
    async fn account_info(&self) -> BridgeResult<AccountInfo> {
        let about: AboutResponse = self
            .get_json(format!("{}/about?fields=user,storageQuota", DRIVE_API_BASE))
            .await?;

        let quota = about.storage_quota;
        Ok(AccountInfo {
            user_name: about.user.display_name,
            user_email: about.user.email_address,
            used_space: quota
                .as_ref()
                .and_then(|q| q.usage.as_deref())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            total_space: quota
                .as_ref()
                .and_then(|q| q.limit.as_deref())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        })
    }

    #[instrument(skip(self))]
    async fn entry_metadata(&self, id: &str) -> BridgeResult<RemoteEntry> {
        let file: DriveFile = self
            .get_json(format!(
                "{}/files/{}?fields={}",
                DRIVE_API_BASE, id, FILE_FIELDS
            ))
            .await?;
        Ok(Self::convert(file))
    }

    #[instrument(skip(self))]
    async fn list_folder(&self, folder_id: Option<&str>) -> BridgeResult<Vec<RemoteEntry>> {
        let query = format!(
            "'{}' in parents and trashed=false",
            Self::escape_query_value(Self::parent_or_root(folder_id))
        );

        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/files?q={}&pageSize=1000&fields=nextPageToken,files({})",
                DRIVE_API_BASE,
                urlencoding::encode(&query),
                FILE_FIELDS
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let page: FilesListResponse = self.get_json(url).await?;
            entries.extend(page.files.into_iter().map(Self::convert));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = entries.len(), "Listed folder");
        Ok(entries)
    }

    async fn find_child_folder(
        &self,
        parent_id: Option<&str>,
        name: &str,
    ) -> BridgeResult<Option<String>> {
        let query = format!(
            "name='{}' and '{}' in parents and mimeType='{}' and trashed=false",
            Self::escape_query_value(name),
            Self::escape_query_value(Self::parent_or_root(parent_id)),
            FOLDER_MIME_TYPE
        );
        let url = format!(
            "{}/files?q={}&fields=files(id,name)",
            DRIVE_API_BASE,
            urlencoding::encode(&query)
        );

        let page: FilesListResponse = self.get_json(url).await?;
        Ok(page.files.into_iter().next().map(|f| f.id))
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, parent_id: Option<&str>, name: &str) -> BridgeResult<String> {
        let metadata = FileMetadata {
            name: name.to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: vec![Self::parent_or_root(parent_id).to_string()],
        };

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files?fields={}", DRIVE_API_BASE, FILE_FIELDS),
        )
        .bearer_token(&self.access_token)
        .json(&metadata)?;

        let response = self.http.execute(request).await.map_err(GoogleDriveError::from)?;
        let response = Self::check(response, "create folder")?;
        let created: DriveFile = response
            .json()
            .map_err(|e| GoogleDriveError::Parse(e.to_string()))?;
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn delete_entry(&self, id: &str) -> BridgeResult<()> {
        let request = HttpRequest::new(
            HttpMethod::Delete,
            format!("{}/files/{}", DRIVE_API_BASE, id),
        )
        .bearer_token(&self.access_token);

        let response = self.http.execute(request).await.map_err(GoogleDriveError::from)?;
        Self::check(response, "delete")?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download_stream(
        &self,
        id: &str,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let request = HttpRequest::new(
            HttpMethod::Get,
            format!("{}/files/{}?alt=media", DRIVE_API_BASE, id),
        )
        .bearer_token(&self.access_token);

        self.http.execute_streaming(request).await
    }

    #[instrument(skip(self, data), fields(len = data.len()))]
    async fn upload_small(
        &self,
        dest: &UploadDestination,
        data: Bytes,
    ) -> BridgeResult<RemoteEntry> {
        let metadata_json = serde_json::to_string(&Self::upload_metadata(dest))
            .map_err(|e| GoogleDriveError::Parse(e.to_string()))?;

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!(
                "{}/files?uploadType=multipart&fields={}",
                UPLOAD_API_BASE, FILE_FIELDS
            ),
        )
        .bearer_token(&self.access_token)
        .header(
            "Content-Type",
            format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
        )
        .body(Self::multipart_body(&metadata_json, &data));

        let response = self.http.execute(request).await.map_err(GoogleDriveError::from)?;
        let response = Self::check(response, "multipart upload")?;
        let file: DriveFile = response
            .json()
            .map_err(|e| GoogleDriveError::Parse(e.to_string()))?;
        Ok(Self::convert(file))
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_start(
        &self,
        dest: &UploadDestination,
        total_size: u64,
        chunk: Bytes,
    ) -> BridgeResult<String> {
        // Mint the upload URL; the destination metadata is fixed here
        let metadata = Self::upload_metadata(dest);
        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files?uploadType=resumable", UPLOAD_API_BASE),
        )
        .bearer_token(&self.access_token)
        .header("X-Upload-Content-Length", total_size.to_string())
        .json(&metadata)
        .map_err(GoogleDriveError::from)?;

        let response = self.http.execute(request).await.map_err(GoogleDriveError::from)?;
        let response = Self::check(response, "open resumable session")?;

        let upload_url = response
            .header("Location")
            .ok_or_else(|| {
                GoogleDriveError::Resumable("missing Location header on session open".to_string())
            })?
            .to_string();

        // First chunk; the engine guarantees it is never the final one
        let put = self.put_chunk(&upload_url, 0, chunk, None).await?;
        if put.status != 308 {
            return Err(GoogleDriveError::Resumable(format!(
                "expected 308 after first chunk, got {}",
                put.status
            ))
            .into());
        }

        Ok(upload_url)
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_append(
        &self,
        session_id: &str,
        cursor: u64,
        chunk: Bytes,
    ) -> BridgeResult<()> {
        let put = self.put_chunk(session_id, cursor, chunk, None).await?;
        if put.status != 308 {
            return Err(GoogleDriveError::Resumable(format!(
                "expected 308 after append at {}, got {}",
                cursor, put.status
            ))
            .into());
        }
        Ok(())
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_finish(
        &self,
        session_id: &str,
        cursor: u64,
        chunk: Bytes,
        _dest: &UploadDestination,
    ) -> BridgeResult<RemoteEntry> {
        let total = cursor + chunk.len() as u64;
        let put = self.put_chunk(session_id, cursor, chunk, Some(total)).await?;
        let response = Self::check(put, "finish resumable session")?;
        let file: DriveFile = response
            .json()
            .map_err(|e| GoogleDriveError::Parse(e.to_string()))?;
        Ok(Self::convert(file))
    }
}

/// Connects authenticated [`GoogleDriveAdapter`] instances.
pub struct GoogleDriveFactory;

impl AdapterFactory for GoogleDriveFactory {
    fn connect(&self, http: Arc<dyn HttpClient>, access_token: &str) -> Arc<dyn StorageAdapter> {
        Arc::new(GoogleDriveAdapter::new(http, access_token.to_string()))
    }
}
