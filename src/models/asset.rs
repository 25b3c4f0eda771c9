//! Normalized asset representation shared across remote instances.

/// One media object, as the engine understands it once normalized out of
/// a remote server's raw album JSON (see `RemoteClient::list_album_assets`).
///
/// `checksum` is never the literal value a server stores when it has none
/// — normalization turns a missing checksum into `""`, and the indexer
/// treats that as "no checksum" rather than a valid key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Asset {
    /// Opaque id on the server that currently holds this asset.
    pub id: String,
    /// Content identity; equality only, never parsed.
    pub checksum: String,
    pub original_filename: Option<String>,
    pub file_created_at: Option<String>,
    pub file_modified_at: Option<String>,
    pub device_asset_id: Option<String>,
    pub device_id: Option<String>,
    /// Known size in bytes, if the server reported one.
    pub size: Option<u64>,
    /// Asset kind as reported by the server (`"IMAGE"`, `"VIDEO"`, ...).
    pub kind: Option<String>,
}

impl Asset {
    /// Builds a minimal asset for tests and fixtures.
    pub fn new(id: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            checksum: checksum.into(),
            ..Default::default()
        }
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = Some(name.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}
