//! Box API 2.0 adapter implementation
//!
//! Implements the `StorageAdapter` capability set over the injected
//! `HttpClient`. Box's chunked upload protocol wants a SHA-1 digest per
//! part and the whole file's digest plus the part list at commit time; the
//! adapter tracks both per open session so the engine can stay on the
//! uniform Start/Append/Finish interface.

use crate::error::{BoxError, Result};
use crate::types::{
    BoxItem, EntriesResponse, ItemsResponse, UploadPartResponse, UploadSessionCreateResponse,
    UploadedPart, UserResponse,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    AccountInfo, AdapterFactory, RemoteEntry, StorageAdapter, UploadDestination,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::json;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Box API base URL
const API_BASE: &str = "https://api.box.com/2.0";

/// Box upload API base URL
const UPLOAD_BASE: &str = "https://upload.box.com/api/2.0";

/// Box addresses the root folder as id "0"
const ROOT_FOLDER_ID: &str = "0";

/// Boundary for multipart/form-data single-shot uploads
const MULTIPART_BOUNDARY: &str = "cumulus_box_upload";

/// Listing page size
const PAGE_LIMIT: u64 = 1000;

/// Per-session bookkeeping Box's commit call requires.
struct SessionState {
    total_size: u64,
    parts: Vec<UploadedPart>,
    /// Running digest over every byte uploaded so far, in order
    file_hasher: Sha1,
}

/// Box API 2.0 adapter.
pub struct BoxAdapter {
    http: Arc<dyn HttpClient>,
    access_token: String,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl BoxAdapter {
    pub fn new(http: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http,
            access_token,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
        value
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn convert(item: BoxItem) -> RemoteEntry {
        RemoteEntry {
            is_folder: item.is_folder(),
            size: item.size.unwrap_or(0),
            created_at: Self::parse_time(item.created_at.as_deref()),
            modified_at: Self::parse_time(item.modified_at.as_deref()),
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
            Err(BoxError::NotFound(format!("{}: {}", context, message)))
        } else {
            Err(BoxError::Api {
                status: response.status,
                message,
            })
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let request = HttpRequest::new(HttpMethod::Get, url).bearer_token(&self.access_token);
        let response = self.http.execute(request).await?;
        let response = Self::check(response, "GET")?;
        response.json().map_err(|e| BoxError::Parse(e.to_string()))
    }

    fn folder_or_root(folder_id: Option<&str>) -> &str {
        folder_id.unwrap_or(ROOT_FOLDER_ID)
    }

    fn sha1_digest_header(data: &[u8]) -> String {
        let digest = Sha1::digest(data);
        format!("sha={}", BASE64_STANDARD.encode(digest))
    }

    /// Assemble the multipart/form-data body of a single-shot upload:
    /// the `attributes` JSON field followed by the `file` field.
    fn multipart_body(attributes_json: &str, file_name: &str, data: &Bytes) -> Bytes {
        let mut body = Vec::with_capacity(attributes_json.len() + data.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"attributes\"\r\n\r\n{a}\r\n\
                 --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                b = MULTIPART_BOUNDARY,
                a = attributes_json,
                f = file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--", MULTIPART_BOUNDARY).as_bytes());
        Bytes::from(body)
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionState>> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Upload one part of a session and record it.
    async fn upload_part(&self, session_id: &str, cursor: u64, chunk: Bytes) -> Result<()> {
        let total_size = {
            let sessions = self.lock_sessions();
            sessions
                .get(session_id)
                .map(|s| s.total_size)
                .ok_or_else(|| BoxError::UnknownSession(session_id.to_string()))?
        };

        let end = cursor + chunk.len() as u64 - 1;
        let request = HttpRequest::new(
            HttpMethod::Put,
            format!("{}/files/upload_sessions/{}", UPLOAD_BASE, session_id),
        )
        .bearer_token(&self.access_token)
        .header("Digest", Self::sha1_digest_header(&chunk))
        .header(
            "Content-Range",
            format!("bytes {}-{}/{}", cursor, end, total_size),
        )
        .header("Content-Type", "application/octet-stream")
        .body(chunk.clone());

        let response = self.http.execute(request).await?;
        let response = Self::check(response, "upload part")?;
        let uploaded: UploadPartResponse = response
            .json()
            .map_err(|e| BoxError::Parse(e.to_string()))?;

        let mut sessions = self.lock_sessions();
        let state = sessions
            .get_mut(session_id)
            .ok_or_else(|| BoxError::UnknownSession(session_id.to_string()))?;
        state.file_hasher.update(&chunk);
        state.parts.push(uploaded.part);
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for BoxAdapter {
    fn chunk_size(&self) -> usize {
        crate::CHUNK_SIZE
    }

    #[instrument(skip(self))]
    async fn account_info(&self) -> BridgeResult<AccountInfo> {
        let user: UserResponse = self.get_json(format!("{}/users/me", API_BASE)).await?;

        Ok(AccountInfo {
            user_name: user.name,
            user_email: user.login,
            used_space: user.space_used.unwrap_or(0),
            total_space: user.space_amount.unwrap_or(0),
        })
    }

    #[instrument(skip(self))]
    async fn entry_metadata(&self, id: &str) -> BridgeResult<RemoteEntry> {
        // Files and folders live on separate endpoints; try the file first
        match self
            .get_json::<BoxItem>(format!("{}/files/{}", API_BASE, id))
            .await
        {
            Ok(item) => Ok(Self::convert(item)),
            Err(BoxError::NotFound(_)) => {
                let folder: BoxItem = self
                    .get_json(format!("{}/folders/{}", API_BASE, id))
                    .await?;
                Ok(Self::convert(folder))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_folder(&self, folder_id: Option<&str>) -> BridgeResult<Vec<RemoteEntry>> {
        let folder = Self::folder_or_root(folder_id);
        let mut entries = Vec::new();
        let mut offset = 0u64;

        loop {
            let page: ItemsResponse = self
                .get_json(format!(
                    "{}/folders/{}/items?fields=type,id,name,size,created_at,modified_at&limit={}&offset={}",
                    API_BASE, folder, PAGE_LIMIT, offset
                ))
                .await?;

            let fetched = page.entries.len() as u64;
            entries.extend(page.entries.into_iter().map(Self::convert));

            offset += fetched;
            if offset >= page.total_count || fetched == 0 {
                break;
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
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/folders", API_BASE))
            .bearer_token(&self.access_token)
            .json(&json!({
                "name": name,
                "parent": { "id": Self::folder_or_root(parent_id) }
            }))
            .map_err(BoxError::from)?;

        let response = self.http.execute(request).await.map_err(BoxError::from)?;
        let response = Self::check(response, "create folder")?;
        let created: BoxItem = response
            .json()
            .map_err(|e| BoxError::Parse(e.to_string()))?;
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn delete_entry(&self, id: &str) -> BridgeResult<()> {
        let request = HttpRequest::new(HttpMethod::Delete, format!("{}/files/{}", API_BASE, id))
            .bearer_token(&self.access_token);

        match Self::check(
            self.http.execute(request).await.map_err(BoxError::from)?,
            "delete file",
        ) {
            Ok(_) => Ok(()),
            Err(BoxError::NotFound(_)) => {
                // Not a file; try the folder endpoint
                let request = HttpRequest::new(
                    HttpMethod::Delete,
                    format!("{}/folders/{}", API_BASE, id),
                )
                .bearer_token(&self.access_token);
                let response = self.http.execute(request).await.map_err(BoxError::from)?;
                Self::check(response, "delete folder")?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn download_stream(
        &self,
        id: &str,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let request = HttpRequest::new(
            HttpMethod::Get,
            format!("{}/files/{}/content", API_BASE, id),
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
        let attributes = serde_json::to_string(&json!({
            "name": dest.file_name,
            "parent": { "id": Self::folder_or_root(dest.folder_id.as_deref()) }
        }))
        .map_err(|e| BoxError::Parse(e.to_string()))?;

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files/content", UPLOAD_BASE),
        )
        .bearer_token(&self.access_token)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        )
        .body(Self::multipart_body(&attributes, &dest.file_name, &data));

        let response = self.http.execute(request).await.map_err(BoxError::from)?;
        let response = Self::check(response, "upload")?;
        let uploaded: EntriesResponse = response
            .json()
            .map_err(|e| BoxError::Parse(e.to_string()))?;
        let item = uploaded
            .entries
            .into_iter()
            .next()
            .ok_or_else(|| BoxError::Parse("upload response carried no entries".to_string()))?;
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
            format!("{}/files/upload_sessions", UPLOAD_BASE),
        )
        .bearer_token(&self.access_token)
        .json(&json!({
            "folder_id": Self::folder_or_root(dest.folder_id.as_deref()),
            "file_size": total_size,
            "file_name": dest.file_name
        }))
        .map_err(BoxError::from)?;

        let response = self.http.execute(request).await.map_err(BoxError::from)?;
        let response = Self::check(response, "create upload session")?;
        let session: UploadSessionCreateResponse = response
            .json()
            .map_err(|e| BoxError::Parse(e.to_string()))?;

        self.lock_sessions().insert(
            session.id.clone(),
            SessionState {
                total_size,
                parts: Vec::new(),
                file_hasher: Sha1::new(),
            },
        );

        if let Err(e) = self.upload_part(&session.id, 0, chunk).await {
            // The session never became usable; forget its bookkeeping
            self.lock_sessions().remove(&session.id);
            return Err(e.into());
        }
        Ok(session.id)
    }

    #[instrument(skip(self, chunk), fields(len = chunk.len()))]
    async fn session_append(
        &self,
        session_id: &str,
        cursor: u64,
        chunk: Bytes,
    ) -> BridgeResult<()> {
        self.upload_part(session_id, cursor, chunk).await?;
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
        // The final bytes go up as the last part, then the commit carries
        // the whole-file digest and the recorded part list
        self.upload_part(session_id, cursor, chunk).await?;

        let (parts, file_digest) = {
            let mut sessions = self.lock_sessions();
            let state = sessions
                .remove(session_id)
                .ok_or_else(|| BoxError::UnknownSession(session_id.to_string()))?;
            let digest = state.file_hasher.finalize();
            (state.parts, format!("sha={}", BASE64_STANDARD.encode(digest)))
        };

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!(
                "{}/files/upload_sessions/{}/commit",
                UPLOAD_BASE, session_id
            ),
        )
        .bearer_token(&self.access_token)
        .header("Digest", file_digest)
        .json(&json!({ "parts": parts }))
        .map_err(BoxError::from)?;

        let response = self.http.execute(request).await.map_err(BoxError::from)?;
        let response = Self::check(response, "commit upload session")?;
        let committed: EntriesResponse = response
            .json()
            .map_err(|e| BoxError::Parse(e.to_string()))?;
        let item = committed
            .entries
            .into_iter()
            .next()
            .ok_or_else(|| BoxError::Parse("commit response carried no entries".to_string()))?;
        Ok(Self::convert(item))
    }
}

/// Connects authenticated [`BoxAdapter`] instances.
pub struct BoxFactory;

impl AdapterFactory for BoxFactory {
    fn connect(&self, http: Arc<dyn HttpClient>, access_token: &str) -> Arc<dyn StorageAdapter> {
        Arc::new(BoxAdapter::new(http, access_token.to_string()))
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

    fn adapter(http: MockHttp) -> BoxAdapter {
        BoxAdapter::new(Arc::new(http), "test-token".to_string())
    }

    #[test]
    fn test_sha1_digest_header_known_vector() {
        // SHA-1 of "abc" is a9993e364706816aba3e25717850c26c9cd0d89d
        let header = BoxAdapter::sha1_digest_header(b"abc");
        assert_eq!(header, "sha=qZk+NkcGgWq6PiVxeFDCbJzQ2J0=");
    }

    #[test]
    fn test_multipart_body_contains_both_fields() {
        let body =
            BoxAdapter::multipart_body(r#"{"name":"a.txt"}"#, "a.txt", &Bytes::from_static(b"hi"));
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("name=\"attributes\""));
        assert!(text.contains(r#"{"name":"a.txt"}"#));
        assert!(text.contains("name=\"file\"; filename=\"a.txt\""));
        assert!(text.contains("hi"));
        assert!(text.ends_with(&format!("--{}--", MULTIPART_BOUNDARY)));
    }

    #[tokio::test]
    async fn test_session_lifecycle_records_parts_and_commits() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        // Session creation carries name, size and folder
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                let body = String::from_utf8(req.body.as_ref().unwrap().to_vec()).unwrap();
                req.url.ends_with("/files/upload_sessions")
                    && body.contains("\"file_size\":25")
                    && body.contains("\"file_name\":\"big.bin\"")
                    && body.contains("\"folder_id\":\"0\"")
            })
            .returning(|_| Ok(response(201, r#"{"id":"sess-1","part_size":163840}"#)));
        // First part
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.url.ends_with("/files/upload_sessions/sess-1")
                    && req.headers.get("Content-Range") == Some(&"bytes 0-9/25".to_string())
                    && req.headers.get("Digest").map(|d| d.starts_with("sha=")) == Some(true)
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"part":{"part_id":"P1","offset":0,"size":10,"sha1":"x"}}"#,
                ))
            });
        // Appended part
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.headers.get("Content-Range") == Some(&"bytes 10-19/25".to_string()))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"part":{"part_id":"P2","offset":10,"size":10,"sha1":"y"}}"#,
                ))
            });
        // Final part
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.headers.get("Content-Range") == Some(&"bytes 20-24/25".to_string()))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"part":{"part_id":"P3","offset":20,"size":5,"sha1":"z"}}"#,
                ))
            });
        // Commit carries all three recorded parts and the file digest
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                let body = String::from_utf8(req.body.as_ref().unwrap().to_vec()).unwrap();
                req.url.ends_with("/files/upload_sessions/sess-1/commit")
                    && body.contains("\"part_id\":\"P1\"")
                    && body.contains("\"part_id\":\"P2\"")
                    && body.contains("\"part_id\":\"P3\"")
                    && req.headers.get("Digest").map(|d| d.starts_with("sha=")) == Some(true)
            })
            .returning(|_| {
                Ok(response(
                    201,
                    r#"{"entries":[{"type":"file","id":"file-1","name":"big.bin","size":25}]}"#,
                ))
            });

        let adapter = adapter(http);
        let dest = UploadDestination::new(None, "big.bin");

        let session = adapter
            .session_start(&dest, 25, Bytes::from(vec![1u8; 10]))
            .await
            .unwrap();
        adapter
            .session_append(&session, 10, Bytes::from(vec![2u8; 10]))
            .await
            .unwrap();
        let entry = adapter
            .session_finish(&session, 20, Bytes::from(vec![3u8; 5]), &dest)
            .await
            .unwrap();

        assert_eq!(entry.id, "file-1");
        assert_eq!(entry.size, 25);
        // Session bookkeeping is dropped after commit
        assert!(adapter.lock_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_append_to_unknown_session_is_protocol_error() {
        let adapter = adapter(MockHttp::new());
        let result = adapter
            .session_append("never-opened", 0, Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(BridgeError::Api { status: 409, .. })));
    }

    #[tokio::test]
    async fn test_list_folder_pages_through_offsets() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.contains("/folders/0/items") && req.url.contains("offset=0"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"total_count":2,"entries":[{"type":"file","id":"1","name":"a.txt","size":1}],
                        "offset":0,"limit":1}"#,
                ))
            });
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.contains("offset=1"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"total_count":2,"entries":[{"type":"folder","id":"2","name":"Docs"}],
                        "offset":1,"limit":1}"#,
                ))
            });

        let adapter = adapter(http);
        let entries = adapter.list_folder(None).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[1].is_folder);
    }

    #[tokio::test]
    async fn test_entry_metadata_falls_back_to_folder_endpoint() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.ends_with("/files/11"))
            .returning(|_| Ok(response(404, "not a file")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.ends_with("/folders/11"))
            .returning(|_| Ok(response(200, r#"{"type":"folder","id":"11","name":"Docs"}"#)));

        let adapter = adapter(http);
        let entry = adapter.entry_metadata("11").await.unwrap();
        assert!(entry.is_folder);
    }

    #[tokio::test]
    async fn test_account_info() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .withf(|req| req.url.ends_with("/users/me"))
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"name":"Jo Doe","login":"jo@example.com","space_amount":10000,"space_used":250}"#,
                ))
            });

        let adapter = adapter(http);
        let info = adapter.account_info().await.unwrap();

        assert_eq!(info.user_name.as_deref(), Some("Jo Doe"));
        assert_eq!(info.user_email.as_deref(), Some("jo@example.com"));
        assert_eq!(info.total_space, 10000);
        assert_eq!(info.used_space, 250);
    }
}
