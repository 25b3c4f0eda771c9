//! Album-related request/response types.

use serde::{Deserialize, Serialize};

/// The album object returned by `get_album_info`.
///
/// Only the fields the engine actually reads are modeled; `assets` stays
/// raw JSON because `list_album_assets`'s normalization (checksum
/// fallback, size aliasing) happens per-entry and tolerates entries that
/// don't look like an asset at all.
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumInfo {
    pub id: String,
    #[serde(default, rename = "albumName")]
    pub album_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<serde_json::Value>,
}

/// Body shared by add/remove-assets-from-album requests.
#[derive(Debug, Clone, Serialize)]
pub struct AssetIdsRequest {
    pub ids: Vec<String>,
}
