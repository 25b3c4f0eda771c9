//! A single reconciled copy/link unit and its outcome.

/// One checksum that needs to exist at `target` and doesn't yet, sourced
/// from `source` (the first server in declaration order that already has
/// it).
#[derive(Debug, Clone)]
pub struct Task {
    pub checksum: String,
    pub source: String,
    pub target: String,
}

impl Task {
    pub fn new(
        checksum: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            checksum: checksum.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Result of executing one [`Task`].
///
/// `Linked`/`Copied` carry the id the asset now has at `target` so a
/// `PresenceSink` can be told what landed where; dry-run copies use an
/// empty string since nothing was actually created.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The target already held the checksum under a different asset id
    /// reachable by album-assets bulk-add, so it was linked instead of
    /// uploaded.
    Linked { task: Task, remote_asset_id: String },
    /// The asset bytes were transferred from source to target and
    /// (unless dry-run) uploaded.
    Copied { task: Task, remote_asset_id: String },
    /// The source's declared size exceeded the target's configured
    /// maximum, so the task was skipped without transferring bytes.
    Oversized {
        task: Task,
        filename: String,
        size: u64,
    },
    /// The task could not be completed; `message` is folded into the
    /// run's `SyncSummary.errors`.
    Failed { task: Task, message: String },
}

impl TaskOutcome {
    pub fn task(&self) -> &Task {
        match self {
            TaskOutcome::Linked { task, .. }
            | TaskOutcome::Copied { task, .. }
            | TaskOutcome::Oversized { task, .. }
            | TaskOutcome::Failed { task, .. } => task,
        }
    }
}
