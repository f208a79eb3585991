//! Box API 2.0 response types
//!
//! Data structures for deserializing Box API responses.

use serde::{Deserialize, Serialize};

/// A Box file or folder item (the fields we consume).
///
/// See: https://developer.box.com/reference/resources/file/
#[derive(Debug, Clone, Deserialize)]
pub struct BoxItem {
    /// "file" or "folder"
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,

    pub id: String,

    pub name: String,

    #[serde(default)]
    pub size: Option<u64>,

    /// RFC 3339 creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,

    /// RFC 3339 modification timestamp
    #[serde(default)]
    pub modified_at: Option<String>,
}

impl BoxItem {
    pub fn is_folder(&self) -> bool {
        self.item_type.as_deref() == Some("folder")
    }
}

/// A folder items listing page.
#[derive(Debug, Deserialize)]
pub struct ItemsResponse {
    pub total_count: u64,
    pub entries: Vec<BoxItem>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
}

/// Wrapper many Box write endpoints use (`{"entries": [item]}`).
#[derive(Debug, Deserialize)]
pub struct EntriesResponse {
    pub entries: Vec<BoxItem>,
}

/// `GET /users/me` (the fields we consume).
#[derive(Debug, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    pub name: Option<String>,

    /// The account login email
    #[serde(default)]
    pub login: Option<String>,

    #[serde(default)]
    pub space_amount: Option<u64>,

    #[serde(default)]
    pub space_used: Option<u64>,
}

/// `POST /files/upload_sessions` response.
#[derive(Debug, Deserialize)]
pub struct UploadSessionCreateResponse {
    pub id: String,

    #[serde(default)]
    pub part_size: Option<u64>,
}

/// One uploaded part as Box records it; echoed back at commit time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_id: String,
    pub offset: u64,
    pub size: u64,
    #[serde(default)]
    pub sha1: Option<String>,
}

/// `PUT /files/upload_sessions/{id}` response.
#[derive(Debug, Deserialize)]
pub struct UploadPartResponse {
    pub part: UploadedPart,
}
