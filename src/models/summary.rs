//! Synchronization summary and per-server statistics.

use std::collections::HashMap;

use serde::Serialize;

/// A single oversize skip recorded against a target server.
#[derive(Debug, Clone, Serialize)]
pub struct OversizedEntry {
    pub checksum: String,
    pub filename: String,
    pub size: u64,
}

/// Mutable per-server counters accumulated over one sync run.
///
/// Invariant: `copied + linked + oversized <= missing_before`; `remaining =
/// missing_before - (copied + linked + oversized + <task errors against
/// this target>)`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerStats {
    pub initial_assets: usize,
    pub missing_before: usize,
    pub remaining: usize,
    pub copied: usize,
    pub linked: usize,
    pub oversized: usize,
    /// Task-level failures charged against this target. Not part of the
    /// spec'd shape — tracked only so `remaining` can be derived — hence
    /// never serialized.
    #[serde(skip)]
    pub(crate) failed: usize,
}

/// Final report of one sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub total_checksums: usize,
    pub copied: usize,
    pub linked: usize,
    pub errors: Vec<String>,
    pub checksumless_assets: HashMap<String, usize>,
    pub oversized: HashMap<String, Vec<OversizedEntry>>,
    pub per_server: HashMap<String, ServerStats>,
}
