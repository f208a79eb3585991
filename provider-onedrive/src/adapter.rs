//! Microsoft Graph adapter implementation
//!
//! Implements the `StorageAdapter` capability set over the injected
//! `HttpClient`. Upload sessions are ranged PUTs against the
//! pre-authorized `uploadUrl` Graph mints — those PUTs carry no
//! Authorization header, and every range must state the file's total size,
//! which the adapter remembers per open session.

use crate::error::{OneDriveError, Result};
use crate::types::{
    ChildrenResponse, DriveItem, DriveResponse, UploadSessionResponse, UserResponse,
};
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    AccountInfo, AdapterFactory, RemoteEntry, StorageAdapter, UploadDestination,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Microsoft Graph base URL
const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Microsoft Graph adapter.
pub struct OneDriveAdapter {
    http: Arc<dyn HttpClient>,
    access_token: String,
    /// Total file size per open upload session (keyed by upload URL);
    /// Graph wants it in every Content-Range.
    session_totals: Mutex<HashMap<String, u64>>,
}

impl OneDriveAdapter {
    pub fn new(http: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http,
            access_token,
            session_totals: Mutex::new(HashMap::new()),
        }
    }

    fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
        value
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn convert(item: DriveItem) -> RemoteEntry {
        RemoteEntry {
            is_folder: item.is_folder(),
            size: item.size.unwrap_or(0),
            created_at: Self::parse_time(item.created_date_time.as_deref()),
            modified_at: Self::parse_time(item.last_modified_date_time.as_deref()),
            id: item.id,
            name: item.name,
        }
    }

    fn check(response: HttpResponse, context: &str) -> Result<HttpResponse> {
        if response.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        if response.status == 404 {
            Err(OneDriveError::NotFound(format!("{}: {}", context, message)))
        } else {
            Err(OneDriveError::Api {
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
            .map_err(|e| OneDriveError::Parse(e.to_string()))
    }

    /// Address an item's children collection: the named item, or the drive
    /// root.
    fn children_url(folder_id: Option<&str>) -> String {
        match folder_id {
            Some(id) => format!("{}/me/drive/items/{}/children", GRAPH_BASE, id),
            None => format!("{}/me/drive/root/children", GRAPH_BASE),
        }
    }

    /// Address a not-yet-existing child by path under a parent item or the
    /// root, e.g. `/me/drive/items/{id}:/name.bin:` — Graph's colon syntax.
    fn child_path_url(dest: &UploadDestination, suffix: &str) -> String {
        let name = urlencoding::encode(&dest.file_name);
        match &dest.folder_id {
            Some(id) => format!("{}/me/drive/items/{}:/{}:{}", GRAPH_BASE, id, name, suffix),
            None => format!("{}/me/drive/root:/{}:{}", GRAPH_BASE, name, suffix),
        }
    }

    fn session_total(&self, session_id: &str) -> Result<u64> {
        self.session_totals
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(session_id)
            .copied()
            .ok_or_else(|| OneDriveError::UnknownSession(session_id.to_string()))
    }

    /// PUT one range to the pre-authorized upload URL (no bearer header).
    async fn put_range(
        &self,
        upload_url: &str,
        cursor: u64,
        total: u64,
        chunk: Bytes,
    ) -> Result<HttpResponse> {
        let end = cursor + chunk.len() as u64 - 1;
        let request = HttpRequest::new(HttpMethod::Put, upload_url.to_string())
            .header(
                "Content-Range",
                format!("bytes {}-{}/{}", cursor, end, total),
            )
            .body(chunk);

        Ok(self.http.execute(request).await?)
    }
}

#[async_trait]
impl StorageAdapter for OneDriveAdapter {
    fn chunk_size(&self) -> usize {
        crate::CHUNK_SIZE
    }

    #[instrument(skip(self))]
    async fn account_info(&self) -> BridgeResult<AccountInfo> {
        let user: UserResponse = self.get_json(format!("{}/me", GRAPH_BASE)).await?;
        let drive: DriveResponse = self.get_json(format!("{}/me/drive", GRAPH_BASE)).await?;

        let quota = drive.quota;
        Ok(AccountInfo {
            user_name: user.display_name,
            // Personal accounts report mail; work accounts may only have
            // the principal name
            user_email: user.mail.or(user.user_principal_name),
            used_space: quota.as_ref().and_then(|q| q.used).unwrap_or(0),
            total_space: quota.as_ref().and_then(|q| q.total).unwrap_or(0),
        })
    }

    #[instrument(skip(self))]
    async fn entry_metadata(&self, id: &str) -> BridgeResult<RemoteEntry> {
        let item: DriveItem = self
            .get_json(format!("{}/me/drive/items/{}", GRAPH_BASE, id))
            .await?;
        Ok(Self::convert(item))
    }

    #[instrument(skip(self))]
    async fn list_folder(&self, folder_id: Option<&str>) -> BridgeResult<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        let mut url = Self::children_url(folder_id);

        loop {
            let page: ChildrenResponse = self.get_json(url).await?;
            entries.extend(page.value.into_iter().map(Self::convert));

            match page.next_link {
                Some(next) => url = next,
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
        let entries = self.list_folder(parent_id).await?;
        Ok(entries
            .into_iter()
            .find(|e| e.is_folder && e.name == name)
            .map(|e| e.id))
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, parent_id: Option<&str>, name: &str) -> BridgeResult<String> {
        let request = HttpRequest::new(HttpMethod::Post, Self::children_url(parent_id))
            .bearer_token(&self.access_token)
            .json(&json!({
                "name": name,
                "folder": {},
                "@microsoft.graph.conflictBehavior": "fail"
            }))
            .map_err(OneDriveError::from)?;

        let response = self.http.execute(request).await.map_err(OneDriveError::from)?;
        let response = Self::check(response, "create folder")?;
        let created: DriveItem = response
            .json()
            .map_err(|e| OneDriveError::Parse(e.to_string()))?;
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn delete_entry(&self, id: &str) -> BridgeResult<()> {
        let request = HttpRequest::new(
            HttpMethod::Delete,
            format!("{}/me/drive/items/{}", GRAPH_BASE, id),
        )
        .bearer_token(&self.access_token);

        let response = self.http.execute(request).await.map_err(OneDriveError::from)?;
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
            format!("{}/me/drive/items/{}/content", GRAPH_BASE, id),
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
        let request = HttpRequest::new(HttpMethod::Put, Self::child_path_url(dest, "/content"))
            .bearer_token(&self.access_token)
            .header("Content-Type", "application/octet-stream")
            .body(data);

        let response = self.http.execute(request).await.map_err(OneDriveError::from)?;
        let response = Self::check(response, "upload")?;
        let item: DriveItem = response
            .json()
            .map_err(|e| OneDriveError::Parse(e.to_string()))?;
        Ok(Self::convert(item))
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_start(
        &self,
        dest: &UploadDestination,
        total_size: u64,
        chunk: Bytes,
    ) -> BridgeResult<String> {
        let request = HttpRequest::new(
            HttpMethod::Post,
            Self::child_path_url(dest, "/createUploadSession"),
        )
        .bearer_token(&self.access_token)
        .json(&json!({
            "item": { "@microsoft.graph.conflictBehavior": "replace" }
        }))
        .map_err(OneDriveError::from)?;

        let response = self.http.execute(request).await.map_err(OneDriveError::from)?;
        let response = Self::check(response, "create upload session")?;
        let session: UploadSessionResponse = response
            .json()
            .map_err(|e| OneDriveError::Parse(e.to_string()))?;

        self.session_totals
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(session.upload_url.clone(), total_size);

        // First range; the engine guarantees more bytes follow
        let first = match self.put_range(&session.upload_url, 0, total_size, chunk).await {
            Ok(put) => Self::check(put, "first range"),
            Err(e) => Err(e),
        };
        if let Err(e) = first {
            // The session never became usable; forget its bookkeeping
            self.session_totals
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .remove(&session.upload_url);
            return Err(e.into());
        }

        Ok(session.upload_url)
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_append(
        &self,
        session_id: &str,
        cursor: u64,
        chunk: Bytes,
    ) -> BridgeResult<()> {
        let total = self.session_total(session_id)?;
        let put = self.put_range(session_id, cursor, total, chunk).await?;
        Self::check(put, "append range")?;
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
        let total = self.session_total(session_id)?;
        let put = self.put_range(session_id, cursor, total, chunk).await?;
        let response = Self::check(put, "final range")?;

        // The final range returns the committed driveItem
        let item: DriveItem = response
            .json()
            .map_err(|e| OneDriveError::Parse(e.to_string()))?;

        self.session_totals
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(session_id);

        Ok(Self::convert(item))
    }
}

/// Connects authenticated [`OneDriveAdapter`] instances.
pub struct OneDriveFactory;

impl AdapterFactory for OneDriveFactory {
    fn connect(&self, http: Arc<dyn HttpClient>, access_token: &str) -> Arc<dyn StorageAdapter> {
        Arc::new(OneDriveAdapter::new(http, access_token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_streaming(
                &self,
                request: HttpRequest,
            ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn adapter(http: MockHttp) -> OneDriveAdapter {
        OneDriveAdapter::new(Arc::new(http), "test-token".to_string())
    }

    #[test]
    fn test_children_url() {
        assert_eq!(
            OneDriveAdapter::children_url(None),
            "https://graph.microsoft.com/v1.0/me/drive/root/children"
        );
        assert_eq!(
            OneDriveAdapter::children_url(Some("item-1")),
            "https://graph.microsoft.com/v1.0/me/drive/items/item-1/children"
        );
    }

    #[test]
    fn test_child_path_url_encodes_name() {
        let dest = UploadDestination::new(None, "my file.bin");
        assert_eq!(
            OneDriveAdapter::child_path_url(&dest, "/content"),
            "https://graph.microsoft.com/v1.0/me/drive/root:/my%20file.bin:/content"
        );
    }

    #[tokio::test]
    async fn test_upload_small_puts_to_child_path() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .withf(|req| {
                req.method == HttpMethod::Put
                    && req.url.ends_with("/me/drive/items/folder-1:/a.bin:/content")
            })
            .returning(|_| Ok(response(201, r#"{"id":"item-9","name":"a.bin","size":3}"#)));

        let adapter = adapter(http);
        let dest = UploadDestination::new(Some("folder-1".to_string()), "a.bin");
        let entry = adapter
            .upload_small(&dest, Bytes::from_static(b"abc"))
            .await
            .unwrap();

        assert_eq!(entry.id, "item-9");
    }

    #[tokio::test]
    async fn test_session_lifecycle_tracks_total_in_ranges() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        // createUploadSession
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.ends_with(":/big.bin:/createUploadSession"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"uploadUrl":"https://up.test/session-1"}"#,
                ))
            });
        // First range (inside session_start); no bearer header on the
        // pre-authorized URL
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.url == "https://up.test/session-1"
                    && req.headers.get("Content-Range") == Some(&"bytes 0-99/250".to_string())
                    && !req.headers.contains_key("Authorization")
            })
            .returning(|_| Ok(response(202, r#"{"nextExpectedRanges":["100-"]}"#)));
        // Append
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.headers.get("Content-Range") == Some(&"bytes 100-199/250".to_string())
            })
            .returning(|_| Ok(response(202, r#"{"nextExpectedRanges":["200-"]}"#)));
        // Final range returns the committed item
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.headers.get("Content-Range") == Some(&"bytes 200-249/250".to_string())
            })
            .returning(|_| {
                Ok(response(
                    201,
                    r#"{"id":"item-done","name":"big.bin","size":250}"#,
                ))
            });

        let adapter = adapter(http);
        let dest = UploadDestination::new(None, "big.bin");

        let session = adapter
            .session_start(&dest, 250, Bytes::from(vec![0u8; 100]))
            .await
            .unwrap();
        adapter
            .session_append(&session, 100, Bytes::from(vec![0u8; 100]))
            .await
            .unwrap();
        let entry = adapter
            .session_finish(&session, 200, Bytes::from(vec![0u8; 50]), &dest)
            .await
            .unwrap();

        assert_eq!(entry.id, "item-done");
        // The total is forgotten once the session committed
        assert!(adapter.session_total(&session).is_err());
    }

    #[tokio::test]
    async fn test_append_to_unknown_session_is_protocol_error() {
        let adapter = adapter(MockHttp::new());
        let result = adapter
            .session_append("https://up.test/never-opened", 0, Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(BridgeError::Api { status: 409, .. })));
    }

    #[tokio::test]
    async fn test_account_info_prefers_mail_over_principal_name() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.ends_with("/me"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"displayName":"Jo","mail":"jo@example.com","userPrincipalName":"jo@contoso.com"}"#,
                ))
            });
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.ends_with("/me/drive"))
            .returning(|_| Ok(response(200, r#"{"quota":{"used":10,"total":100}}"#)));

        let adapter = adapter(http);
        let info = adapter.account_info().await.unwrap();

        assert_eq!(info.user_email.as_deref(), Some("jo@example.com"));
        assert_eq!(info.used_space, 10);
        assert_eq!(info.total_space, 100);
    }

    #[tokio::test]
    async fn test_list_folder_follows_next_link() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.ends_with("/me/drive/root/children"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"value":[{"id":"a","name":"a.txt","size":1}],
                        "@odata.nextLink":"https://graph.microsoft.com/v1.0/page2"}"#,
                ))
            });
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.ends_with("/page2"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"value":[{"id":"b","name":"Docs","folder":{}}]}"#,
                ))
            });

        let adapter = adapter(http);
        let entries = adapter.list_folder(None).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[1].is_folder);
    }

    #[tokio::test]
    async fn test_entry_metadata_404_is_not_found() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, "itemNotFound")));

        let adapter = adapter(http);
        let result = adapter.entry_metadata("missing").await;
        assert!(matches!(result, Err(BridgeError::NotFound(_))));
    }
}
