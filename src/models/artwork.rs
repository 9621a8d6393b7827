//! The assembled artwork view and the sidecar `meta.json` document.

use serde::{Deserialize, Serialize};

/// One portfolio entry, assembled from a storage namespace plus the optional
/// database overlay.
///
/// Text and date fields use the empty string for "absent"; empty fields are
/// omitted from the JSON output.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    /// Opaque identifier, also the storage namespace.
    pub id: String,

    /// Display title. Defaults to a humanized form of `id`.
    pub title: String,

    /// Image filenames, sorted ascending.
    pub images: Vec<String>,

    /// Video filenames, sorted ascending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detalle: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub painted_location: String,

    /// `YYYY-MM-DD` when known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start_date: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end_date: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub in_progress: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bitacora: String,

    /// Cover image; falls back to the first entry of `images`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_image: String,
}

impl Artwork {
    /// A bare record for `id` with only the derived title filled in.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Artworks with no media are hidden from listings.
    pub fn has_media(&self) -> bool {
        !self.images.is_empty() || !self.videos.is_empty()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Response body for the listing endpoints.
#[derive(Serialize, Debug)]
pub struct ArtworkListResponse {
    pub artworks: Vec<Artwork>,
    pub total: usize,
}

impl From<Vec<Artwork>> for ArtworkListResponse {
    fn from(artworks: Vec<Artwork>) -> Self {
        let total = artworks.len();
        Self { artworks, total }
    }
}

/// Structured sidecar stored as `meta.json` inside an artwork namespace.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtworkMeta {
    pub painted_location: String,
    pub start_date: String,
    pub end_date: String,
    pub in_progress: bool,
}

/// Body of the admin "create artwork" request.
#[derive(Deserialize, Debug, Clone)]
pub struct CreateArtworkRequest {
    pub title: String,
}

/// Body of the admin upsert request. Every field is replaced; omitted
/// fields count as empty.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtworkUpdate {
    pub title: String,
    pub painted_location: String,
    pub start_date: String,
    pub end_date: String,
    pub in_progress: bool,
    pub detalle: String,
    pub bitacora: String,
    pub primary_image: String,
}

/// Query string of `GET /admin/artworks/check-title`.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckTitleQuery {
    pub title: String,
    pub exclude_id: String,
}
