//! Remote media-server client with endpoint-variant fallbacks.
//!
//! Each instance gets its own [`RemoteClient`], constructed once at run
//! start and dropped at run end; there is nothing to explicitly close.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::models::{AlbumInfo, Asset, AssetIdsRequest};

/// Upload-time metadata derived from the source asset.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub device_asset_id: String,
    pub device_id: String,
    pub file_created_at: String,
    pub file_modified_at: String,
}

/// Result of [`RemoteClient::validate`].
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub can_list_albums: bool,
    pub can_list_albums_status: Option<u16>,
    pub can_read_album: bool,
    pub can_read_album_status: Option<u16>,
    pub can_modify_album: bool,
    pub can_modify_album_status: Option<u16>,
}

/// The subset of remote operations the transfer executor drives.
///
/// Kept deliberately narrow (list, download, upload, link, bulk-check) so
/// the executor can be exercised against a fake in tests without a live
/// HTTP stack. `get_album_info`, `list_albums`, `remove_assets_from_album`
/// and `validate` stay inherent methods on [`RemoteClient`] — the executor
/// never calls them, so generalizing them would buy nothing.
pub trait RemoteApi: Send + Sync {
    /// The server name this instance was configured with (declaration order key).
    fn name(&self) -> &str;

    /// Configured size cap, if any.
    fn size_limit_bytes(&self) -> Option<u64>;

    /// Normalized assets currently in the configured album.
    async fn list_album_assets(&self) -> Result<Vec<Asset>>;

    /// Downloads the original bytes of one asset.
    async fn download_asset(&self, asset_id: &str) -> Result<Bytes>;

    /// Uploads new asset bytes; returns the new asset id.
    async fn upload_asset(
        &self,
        filename: &str,
        content: Bytes,
        metadata: &UploadMetadata,
        checksum: Option<&str>,
    ) -> Result<String>;

    /// Attaches already-present asset ids to the configured album.
    async fn add_assets_to_album(&self, ids: &[String]) -> Result<()>;

    /// Raw bulk-upload-check response body; parsing duplicate markers
    /// out of it is the caller's job.
    async fn check_bulk_upload(&self, checksum: &str) -> Result<Value>;
}

/// Live client for one remote media-server instance.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    name: String,
    album_id: String,
    size_limit_bytes: Option<u64>,
}

impl RemoteClient {
    /// Builds a client for one instance. `base_url` has its trailing `/`
    /// and a trailing `/api` segment stripped; every operation re-adds
    /// `/api` itself.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        api_key: &str,
        album_id: impl Into<String>,
        size_limit_bytes: Option<u64>,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(SyncError::InvalidApiKey);
        }

        let mut trimmed = base_url.trim_end_matches('/');
        if let Some(stripped) = trimmed.strip_suffix("/api") {
            trimmed = stripped;
        }

        let mut headers = HeaderMap::new();
        let header_value =
            HeaderValue::from_str(api_key).map_err(|_| SyncError::InvalidApiKey)?;
        headers.insert("x-api-key", header_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: trimmed.to_string(),
            name: name.into(),
            album_id: album_id.into(),
            size_limit_bytes,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /api/albums/{album_id}`.
    pub async fn get_album_info(&self) -> Result<AlbumInfo> {
        let response = self
            .http
            .get(self.url(&format!("/api/albums/{}", self.album_id)))
            .send()
            .await?;
        Self::parse_ok(response).await
    }

    /// `GET /api/albums`; reduces any failure to `(false, status)` rather
    /// than propagating it.
    pub async fn list_albums(&self) -> (bool, Option<u16>) {
        match self.http.get(self.url("/api/albums")).send().await {
            Ok(response) => {
                let status = response.status();
                (status.is_success(), Some(status.as_u16()))
            }
            Err(_) => (false, None),
        }
    }

    /// `DELETE /api/albums/{album_id}/assets`.
    pub async fn remove_assets_from_album(&self, ids: &[String]) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/api/albums/{}/assets", self.album_id)))
            .json(&AssetIdsRequest { ids: ids.to_vec() })
            .send()
            .await?;
        Self::expect_success(response).await
    }

    /// Probes read/write access without mutating album membership, beyond
    /// a reversible empty add-assets call.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let (can_list_albums, can_list_albums_status) = self.list_albums().await;

        let read_response = self
            .http
            .get(self.url(&format!("/api/albums/{}", self.album_id)))
            .send()
            .await;
        let (can_read_album, can_read_album_status) = match &read_response {
            Ok(r) => (r.status().is_success(), Some(r.status().as_u16())),
            Err(_) => (false, None),
        };

        let modify_response = self
            .http
            .put(self.url(&format!("/api/albums/{}/assets", self.album_id)))
            .json(&AssetIdsRequest { ids: vec![] })
            .send()
            .await;
        let (can_modify_album, can_modify_album_status) = match &modify_response {
            Ok(r) => {
                let status = r.status();
                // A 400 to an empty ids list is authorized-but-bad-request.
                (
                    status.is_success() || status == StatusCode::BAD_REQUEST,
                    Some(status.as_u16()),
                )
            }
            Err(_) => (false, None),
        };

        Ok(ValidationReport {
            can_list_albums,
            can_list_albums_status,
            can_read_album,
            can_read_album_status,
            can_modify_album,
            can_modify_album_status,
        })
    }

    async fn parse_ok<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(SyncError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(SyncError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Normalizes one raw album-asset JSON entry: keeps only entries with a non-empty `id`;
    /// `checksum` falls back to `exifInfo.hash`; `size` accepts either
    /// `fileSizeInByte` or `size`.
    fn normalize_asset(value: &Value) -> Option<Asset> {
        let id = value.get("id")?.as_str()?;
        if id.is_empty() {
            return None;
        }

        let checksum = value
            .get("checksum")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| value.pointer("/exifInfo/hash").and_then(Value::as_str))
            .unwrap_or("")
            .to_string();

        let size = value
            .get("fileSizeInByte")
            .or_else(|| value.get("size"))
            .and_then(Value::as_u64);

        Some(Asset {
            id: id.to_string(),
            checksum,
            original_filename: str_field(value, "originalFileName"),
            file_created_at: str_field(value, "fileCreatedAt"),
            file_modified_at: str_field(value, "fileModifiedAt"),
            device_asset_id: str_field(value, "deviceAssetId"),
            device_id: str_field(value, "deviceId"),
            size,
            kind: str_field(value, "type"),
        })
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

impl RemoteApi for RemoteClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_limit_bytes(&self) -> Option<u64> {
        self.size_limit_bytes
    }

    async fn list_album_assets(&self) -> Result<Vec<Asset>> {
        let info = self.get_album_info().await?;
        Ok(info
            .assets
            .iter()
            .filter_map(Self::normalize_asset)
            .collect())
    }

    async fn download_asset(&self, asset_id: &str) -> Result<Bytes> {
        const VARIANTS: &[&str] = &[
            "/api/assets/{id}/original",
            "/api/assets/download/{id}",
            "/api/assets/{id}/download",
        ];

        let mut last_error = None;
        for template in VARIANTS {
            let path = template.replace("{id}", asset_id);
            let response = self.http.get(self.url(&path)).send().await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                last_error = Some(SyncError::Api {
                    status: status.as_u16(),
                    message: "not found".to_string(),
                });
                continue;
            }
            if status.is_success() {
                return Ok(response.bytes().await?);
            }
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Err(last_error.expect("at least one variant attempted"))
    }

    async fn upload_asset(
        &self,
        filename: &str,
        content: Bytes,
        metadata: &UploadMetadata,
        checksum: Option<&str>,
    ) -> Result<String> {
        const VARIANTS: &[&str] = &["/api/assets", "/api/assets/upload"];

        let mut last_error = None;
        for path in VARIANTS {
            let part = reqwest::multipart::Part::bytes(content.to_vec())
                .file_name(filename.to_string());
            let form = reqwest::multipart::Form::new()
                .part("assetData", part)
                .text("deviceAssetId", metadata.device_asset_id.clone())
                .text("deviceId", metadata.device_id.clone())
                .text("fileCreatedAt", metadata.file_created_at.clone())
                .text("fileModifiedAt", metadata.file_modified_at.clone());

            let mut request = self.http.post(self.url(path)).multipart(form);
            if let Some(checksum) = checksum {
                request = request.header("x-immich-checksum", checksum);
            }

            let response = request.send().await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                last_error = Some(SyncError::Api {
                    status: status.as_u16(),
                    message: "not found".to_string(),
                });
                continue;
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(SyncError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: Value = response.json().await?;
            let id = body
                .get("id")
                .or_else(|| body.get("assetId"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if id.is_empty() {
                return Err(SyncError::UploadNoId);
            }
            return Ok(id.to_string());
        }
        Err(last_error.expect("at least one variant attempted"))
    }

    async fn add_assets_to_album(&self, ids: &[String]) -> Result<()> {
        let path = format!("/api/albums/{}/assets", self.album_id);
        let body = AssetIdsRequest { ids: ids.to_vec() };

        let response = self.http.put(self.url(&path)).json(&body).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            let response = self.http.post(self.url(&path)).json(&body).send().await?;
            return Self::expect_success(response).await;
        }
        Self::expect_success(response).await
    }

    async fn check_bulk_upload(&self, checksum: &str) -> Result<Value> {
        const VARIANTS: &[&str] = &["/api/assets/check", "/api/asset/check"];

        #[derive(Serialize)]
        struct CheckEntry<'a> {
            id: &'a str,
            checksum: &'a str,
        }
        #[derive(Serialize)]
        struct CheckRequest<'a> {
            assets: [CheckEntry<'a>; 1],
        }

        let body = CheckRequest {
            assets: [CheckEntry {
                id: "sync",
                checksum,
            }],
        };

        let mut last_error = None;
        for path in VARIANTS {
            let response = self
                .http
                .post(self.url(path))
                .method(Method::POST)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
                let message = response.text().await.unwrap_or_default();
                last_error = Some(SyncError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(SyncError::Api {
                    status: status.as_u16(),
                    message,
                });
            }
            return Ok(response.json().await?);
        }
        Err(last_error.expect("at least one variant attempted"))
    }
}
