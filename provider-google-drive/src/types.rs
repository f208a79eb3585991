//! Google Drive API v3 response types
//!
//! Data structures for deserializing Google Drive API v3 responses.

use serde::{Deserialize, Serialize};

/// MIME type Google Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive API file resource
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    pub name: String,

    /// MIME type
    #[serde(default)]
    pub mime_type: Option<String>,

    /// File size in bytes as a decimal string (omitted for folders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Creation time (RFC 3339)
    #[serde(default)]
    pub created_time: Option<String>,

    /// Modification time (RFC 3339)
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

/// `files.list` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    pub files: Vec<DriveFile>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Request body for `files.create` (folder creation) and for resumable
/// session metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// `about.get` response (the fields we consume)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutResponse {
    pub user: AboutUser,

    #[serde(default)]
    pub storage_quota: Option<StorageQuota>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutUser {
    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageQuota {
    #[serde(default)]
    pub limit: Option<String>,

    #[serde(default)]
    pub usage: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_drive_file() {
        let json = r#"{
            "id": "abc123",
            "name": "report.pdf",
            "mimeType": "application/pdf",
            "size": "2048",
            "createdTime": "2023-01-01T00:00:00.000Z",
            "modifiedTime": "2023-01-02T00:00:00.000Z"
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(file.size.as_deref(), Some("2048"));
        assert!(!file.is_folder());
    }

    #[test]
    fn test_folder_detection() {
        let json = r#"{
            "id": "folder1",
            "name": "Docs",
            "mimeType": "application/vnd.google-apps.folder"
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert!(file.is_folder());
        assert!(file.size.is_none());
    }

    #[test]
    fn test_deserialize_files_list_response() {
        let json = r#"{
            "files": [
                {"id": "f1", "name": "a.txt", "mimeType": "text/plain", "size": "5"}
            ],
            "nextPageToken": "token123"
        }"#;

        let response: FilesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.files.len(), 1);
        assert_eq!(response.next_page_token.as_deref(), Some("token123"));
    }

    #[test]
    fn test_serialize_folder_metadata() {
        let metadata = FileMetadata {
            name: "New Folder".to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: vec!["parent1".to_string()],
        };

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"name\":\"New Folder\""));
        assert!(json.contains("vnd.google-apps.folder"));
        assert!(json.contains("\"parents\":[\"parent1\"]"));
    }

    #[test]
    fn test_deserialize_about_response() {
        let json = r#"{
            "user": {"displayName": "Jo Doe", "emailAddress": "jo@example.com"},
            "storageQuota": {"limit": "1000000", "usage": "250"}
        }"#;

        let about: AboutResponse = serde_json::from_str(json).unwrap();
        assert_eq!(about.user.display_name.as_deref(), Some("Jo Doe"));
        assert_eq!(
            about.storage_quota.unwrap().usage.as_deref(),
            Some("250")
        );
    }
}
