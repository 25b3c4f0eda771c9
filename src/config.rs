//! Sync configuration: the JSON config file and its validation.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SyncError};

/// One participating instance. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub album_id: String,
    #[serde(default)]
    pub size_limit_bytes: Option<u64>,
}

/// Root of the configuration file: `{ "servers": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub servers: Vec<ServerConfig>,
}

impl SyncConfig {
    /// Loads and validates a config file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config: SyncConfig = serde_json::from_str(&contents)
            .map_err(|e| SyncError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validation rules: at least two servers, unique non-empty names,
    /// every required field present, `size_limit_bytes` positive when set.
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(SyncError::Config(
                "servers must be a non-empty list".to_string(),
            ));
        }
        if self.servers.len() < 2 {
            return Err(SyncError::Config(
                "a sync requires at least two servers".to_string(),
            ));
        }

        let mut seen_names = HashSet::new();
        for server in &self.servers {
            if server.name.is_empty() {
                return Err(SyncError::Config(
                    "server entry is missing a name".to_string(),
                ));
            }
            if server.base_url.is_empty() {
                return Err(SyncError::Config(format!(
                    "server {} is missing base_url",
                    server.name
                )));
            }
            if server.api_key.is_empty() {
                return Err(SyncError::Config(format!(
                    "server {} is missing api_key",
                    server.name
                )));
            }
            if server.album_id.is_empty() {
                return Err(SyncError::Config(format!(
                    "server {} is missing album_id",
                    server.name
                )));
            }
            if let Some(limit) = server.size_limit_bytes
                && limit == 0
            {
                return Err(SyncError::Config(format!(
                    "server {} has a size_limit_bytes that is not a positive integer",
                    server.name
                )));
            }
            if !seen_names.insert(server.name.clone()) {
                return Err(SyncError::Config(format!(
                    "duplicate server name {}",
                    server.name
                )));
            }
        }

        Ok(())
    }

    /// Declaration order of server names, used by the reconciler for
    /// source selection.
    pub fn declared_order(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.name.clone()).collect()
    }

    /// Deterministic key for the process-wide progress registry: the
    /// sorted, comma-joined server names (`sync_assets`'s literal
    /// signature has no explicit `group_id` parameter).
    pub fn group_id(&self) -> String {
        let mut names = self.declared_order();
        names.sort();
        names.join(",")
    }
}
