//! Microsoft Graph response types
//!
//! Data structures for deserializing Graph drive responses.

use serde::Deserialize;

/// A Graph driveItem (the fields we consume).
///
/// See: https://learn.microsoft.com/graph/api/resources/driveitem
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub size: Option<u64>,

    /// Present when the item is a folder
    #[serde(default)]
    pub folder: Option<FolderFacet>,

    #[serde(default)]
    pub created_date_time: Option<String>,

    #[serde(default)]
    pub last_modified_date_time: Option<String>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderFacet {
    #[serde(default, rename = "childCount")]
    pub child_count: Option<u64>,
}

/// A children listing page.
#[derive(Debug, Deserialize)]
pub struct ChildrenResponse {
    pub value: Vec<DriveItem>,

    /// Link to the next page, when the listing is paginated
    #[serde(default, rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// `GET /me` (the fields we consume).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub mail: Option<String>,

    #[serde(default)]
    pub user_principal_name: Option<String>,
}

/// `GET /me/drive` (the fields we consume).
#[derive(Debug, Deserialize)]
pub struct DriveResponse {
    #[serde(default)]
    pub quota: Option<Quota>,
}

#[derive(Debug, Deserialize)]
pub struct Quota {
    #[serde(default)]
    pub used: Option<u64>,

    #[serde(default)]
    pub total: Option<u64>,
}

/// `createUploadSession` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    pub upload_url: String,

    #[serde(default)]
    pub expiration_date_time: Option<String>,
}
