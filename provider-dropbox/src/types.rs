//! Dropbox API v2 response types
//!
//! Data structures for deserializing Dropbox API responses.

use serde::{Deserialize, Serialize};

/// A file or folder metadata record.
///
/// See: https://www.dropbox.com/developers/documentation/http/documentation#files-get_metadata
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    /// "file" or "folder"
    #[serde(rename = ".tag", default)]
    pub tag: Option<String>,

    pub name: String,

    /// Display path; used as the entry id throughout this adapter
    #[serde(default)]
    pub path_display: Option<String>,

    #[serde(default)]
    pub id: Option<String>,

    /// File size in bytes (absent for folders)
    #[serde(default)]
    pub size: Option<u64>,

    /// Server modification time (ISO 8601, files only)
    #[serde(default)]
    pub server_modified: Option<String>,

    /// Client modification time (ISO 8601, files only)
    #[serde(default)]
    pub client_modified: Option<String>,
}

impl Metadata {
    pub fn is_folder(&self) -> bool {
        self.tag.as_deref() == Some("folder")
    }
}

/// `files/list_folder` response.
#[derive(Debug, Deserialize)]
pub struct ListFolderResponse {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// `files/list_folder/continue` request body.
#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg {
    pub cursor: String,
}

/// `files/create_folder_v2` / `files/delete_v2` response wrapper.
#[derive(Debug, Deserialize)]
pub struct MetadataWrapper {
    pub metadata: Metadata,
}

/// `users/get_current_account` response (the fields we consume).
#[derive(Debug, Deserialize)]
pub struct FullAccount {
    pub name: AccountName,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountName {
    pub display_name: String,
}

/// `users/get_space_usage` response.
#[derive(Debug, Deserialize)]
pub struct SpaceUsage {
    pub used: u64,
    pub allocation: SpaceAllocation,
}

#[derive(Debug, Deserialize)]
pub struct SpaceAllocation {
    #[serde(default)]
    pub allocated: Option<u64>,
}

/// `files/upload_session/start` response.
#[derive(Debug, Deserialize)]
pub struct UploadSessionStartResponse {
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_file_metadata() {
        let json = r#"{
            ".tag": "file",
            "name": "report.pdf",
            "path_display": "/Docs/report.pdf",
            "id": "id:abc123",
            "size": 2048,
            "server_modified": "2023-05-01T10:00:00Z",
            "client_modified": "2023-05-01T09:00:00Z"
        }"#;

        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.name, "report.pdf");
        assert_eq!(meta.path_display.as_deref(), Some("/Docs/report.pdf"));
        assert_eq!(meta.size, Some(2048));
        assert!(!meta.is_folder());
    }

    #[test]
    fn test_deserialize_folder_metadata() {
        let json = r#"{
            ".tag": "folder",
            "name": "Docs",
            "path_display": "/Docs",
            "id": "id:folder1"
        }"#;

        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert!(meta.is_folder());
        assert!(meta.size.is_none());
    }

    #[test]
    fn test_deserialize_list_folder_response() {
        let json = r#"{
            "entries": [
                {".tag": "folder", "name": "Photos", "path_display": "/Photos"},
                {".tag": "file", "name": "a.txt", "path_display": "/a.txt", "size": 5}
            ],
            "cursor": "cursor123",
            "has_more": false
        }"#;

        let response: ListFolderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.entries.len(), 2);
        assert!(!response.has_more);
    }

    #[test]
    fn test_deserialize_space_usage() {
        let json = r#"{
            "used": 1000,
            "allocation": {".tag": "individual", "allocated": 2000000}
        }"#;

        let usage: SpaceUsage = serde_json::from_str(json).unwrap();
        assert_eq!(usage.used, 1000);
        assert_eq!(usage.allocation.allocated, Some(2000000));
    }

    #[test]
    fn test_deserialize_session_start_response() {
        let json = r#"{"session_id": "pid_upload_session:AAA"}"#;
        let response: UploadSessionStartResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.session_id, "pid_upload_session:AAA");
    }
}
