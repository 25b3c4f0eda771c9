//! Live progress snapshots and the process-wide registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{OversizedEntry, ServerStats, SyncSummary, Task, TaskOutcome};

/// Coarse run state surfaced to collaborators polling [`get_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
}

/// Per-target progress counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstanceProgress {
    pub missing: usize,
    pub done: usize,
    pub already: usize,
}

/// Defensive copy returned by [`get_progress`]; mutating it has no effect
/// on the run it was read from.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub status: RunStatus,
    pub total: usize,
    pub done: usize,
    pub remaining: usize,
    pub already: usize,
    pub per_instance: HashMap<String, InstanceProgress>,
    pub oversized: HashMap<String, Vec<OversizedEntry>>,
    pub started_at: Option<DateTime<Utc>>,
    pub eta_seconds: Option<f64>,
    pub instance_labels: Option<HashMap<String, String>>,
}

impl ProgressSnapshot {
    /// The record collaborators see when no sync has ever run for a
    /// group.
    pub fn zero() -> Self {
        Self {
            status: RunStatus::Idle,
            total: 0,
            done: 0,
            remaining: 0,
            already: 0,
            per_instance: HashMap::new(),
            oversized: HashMap::new(),
            started_at: None,
            eta_seconds: None,
            instance_labels: None,
        }
    }
}

/// Combined, lock-guarded state for one in-flight run: the summary being
/// built and the snapshot surfaced to `get_progress`, updated together so
/// `progress.done` and `per_instance[target].done` never observably
/// diverge.
struct RunState {
    summary: SyncSummary,
    snapshot: ProgressSnapshot,
    start_instant: tokio::time::Instant,
}

/// Handle held by the concurrency harness; cheap to clone, shares one
/// lock per run.
#[derive(Clone)]
pub struct ProgressHandle {
    state: Arc<Mutex<RunState>>,
}

impl ProgressHandle {
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        group_id: &str,
        total_checksums: usize,
        checksumless_assets: HashMap<String, usize>,
        per_server: HashMap<String, ServerStats>,
        missing_counts: HashMap<String, usize>,
        already_counts: HashMap<String, usize>,
        total_tasks: usize,
        instance_labels: Option<HashMap<String, String>>,
        publish: bool,
    ) -> Self {
        let mut per_instance = HashMap::new();
        let mut already_total = 0usize;
        for (server, missing) in &missing_counts {
            let already = already_counts.get(server).copied().unwrap_or(0);
            already_total += already;
            per_instance.insert(
                server.clone(),
                InstanceProgress {
                    missing: *missing,
                    done: 0,
                    already,
                },
            );
        }

        let snapshot = ProgressSnapshot {
            status: RunStatus::Running,
            total: total_tasks,
            done: 0,
            remaining: total_tasks,
            already: already_total,
            per_instance,
            oversized: HashMap::new(),
            started_at: Some(Utc::now()),
            eta_seconds: None,
            instance_labels,
        };

        let summary = SyncSummary {
            total_checksums,
            checksumless_assets,
            per_server,
            ..Default::default()
        };

        let handle = Self {
            state: Arc::new(Mutex::new(RunState {
                summary,
                snapshot,
                start_instant: tokio::time::Instant::now(),
            })),
        };
        if publish {
            registry().lock().unwrap().insert(group_id.to_string(), handle.clone());
        }
        handle
    }

    /// Applies one task outcome to both the summary and the live
    /// snapshot under a single lock.
    pub fn record(&self, outcome: &TaskOutcome) {
        let mut state = self.state.lock().unwrap();
        let task = task_of(outcome);
        let target = task.target.clone();

        match outcome {
            TaskOutcome::Linked { .. } => {
                state.summary.linked += 1;
                state
                    .summary
                    .per_server
                    .entry(target.clone())
                    .or_default()
                    .linked += 1;
            }
            TaskOutcome::Copied { .. } => {
                state.summary.copied += 1;
                state
                    .summary
                    .per_server
                    .entry(target.clone())
                    .or_default()
                    .copied += 1;
            }
            TaskOutcome::Oversized {
                filename, size, ..
            } => {
                state
                    .summary
                    .per_server
                    .entry(target.clone())
                    .or_default()
                    .oversized += 1;
                state
                    .summary
                    .oversized
                    .entry(target.clone())
                    .or_default()
                    .push(OversizedEntry {
                        checksum: task.checksum.clone(),
                        filename: filename.clone(),
                        size: *size,
                    });
                state
                    .snapshot
                    .oversized
                    .entry(target.clone())
                    .or_default()
                    .push(OversizedEntry {
                        checksum: task.checksum.clone(),
                        filename: filename.clone(),
                        size: *size,
                    });
            }
            TaskOutcome::Failed { message, .. } => {
                state.summary.errors.push(format!(
                    "Failed to copy {} from {} to {}: {message}",
                    task.checksum, task.source, task.target
                ));
                state
                    .summary
                    .per_server
                    .entry(target.clone())
                    .or_default()
                    .failed += 1;
            }
        }

        recompute_remaining(&mut state, &target);

        state.snapshot.done += 1;
        if let Some(instance) = state.snapshot.per_instance.get_mut(&target) {
            instance.done += 1;
        }
        state.snapshot.remaining = state.snapshot.total.saturating_sub(state.snapshot.done);

        let elapsed = state.start_instant.elapsed().as_secs_f64();
        if state.snapshot.done >= 1 && elapsed > 0.0 {
            let rate = state.snapshot.done as f64 / elapsed;
            state.snapshot.eta_seconds = Some(state.snapshot.remaining as f64 / rate);
        }
    }

    /// Marks the run finished (cancelled or completed) and returns the
    /// final summary. The registry keeps the last snapshot at
    /// `status=idle` for subsequent `get_progress` reads.
    pub fn finish(self) -> SyncSummary {
        let mut state = self.state.lock().unwrap();
        state.snapshot.status = RunStatus::Idle;
        state.summary.clone()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().unwrap().snapshot.clone()
    }
}

fn recompute_remaining(state: &mut RunState, target: &str) {
    if let Some(stats) = state.summary.per_server.get_mut(target) {
        stats.remaining = stats
            .missing_before
            .saturating_sub(stats.copied + stats.linked + stats.oversized + stats.failed);
    }
}

fn task_of(outcome: &TaskOutcome) -> &Task {
    outcome.task()
}

type Registry = Mutex<HashMap<String, ProgressHandle>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Reads the current progress for `group_id`, or the zero record if no
/// run has ever started for it. Safe to call concurrently
/// with an active sync.
pub fn get_progress(group_id: &str) -> ProgressSnapshot {
    registry()
        .lock()
        .unwrap()
        .get(group_id)
        .map(ProgressHandle::snapshot)
        .unwrap_or_else(ProgressSnapshot::zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_record_for_unknown_group() {
        let snapshot = get_progress("never-ran");
        assert_eq!(snapshot.status, RunStatus::Idle);
        assert_eq!(snapshot.total, 0);
    }

    #[tokio::test]
    async fn record_advances_done_monotonically() {
        let handle = ProgressHandle::start(
            "test-group-monotonic",
            1,
            HashMap::new(),
            HashMap::from([("secondary".to_string(), ServerStats::default())]),
            HashMap::from([("secondary".to_string(), 1usize)]),
            HashMap::new(),
            1,
            None,
            false,
        );
        let task = Task::new("chk1", "primary", "secondary");
        handle.record(&TaskOutcome::Copied {
            task,
            remote_asset_id: "id-1".to_string(),
        });
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.done, 1);
        assert_eq!(snapshot.remaining, 0);
        assert_eq!(snapshot.per_instance["secondary"].done, 1);
    }
}
