//! Transfer executor and concurrency harness.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use governor::{Quota, RateLimiter};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::client::{RemoteApi, UploadMetadata};
use crate::models::{Asset, Task, TaskOutcome};
use crate::presence::PresenceSink;
use crate::progress::ProgressHandle;

/// Governor's single-key, in-memory direct rate limiter.
type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Runs one task against a pair of remote clients.
///
/// `source_asset` is the snapshot taken at scheduling time; source
/// selection never changes within one task's execution.
pub async fn run_task<C: RemoteApi>(
    task: Task,
    source_asset: Asset,
    source: &C,
    target: &C,
    dry_run: bool,
) -> TaskOutcome {
    // Dry-run skips every step below, including the size gate: it still
    // counts as copied and still mutates the index.
    if dry_run {
        return TaskOutcome::Copied {
            task,
            remote_asset_id: String::new(),
        };
    }

    // Size gate A.
    if let (Some(limit), Some(size)) = (target.size_limit_bytes(), source_asset.size)
        && size > limit
    {
        let filename = filename_for(&source_asset);
        return TaskOutcome::Oversized {
            task,
            filename,
            size,
        };
    }

    match try_link(&task, &source_asset, target).await {
        Ok(Some(existing_id)) => {
            if let Err(e) = target.add_assets_to_album(&[existing_id.clone()]).await {
                return TaskOutcome::Failed {
                    task,
                    message: e.to_string(),
                };
            }
            return TaskOutcome::Linked {
                task,
                remote_asset_id: existing_id,
            };
        }
        Ok(None) => {}
        Err(_) => {
            // Link attempt failed outright (transport, malformed body);
            // fall through to copy rather than propagate the error.
        }
    }

    run_copy(task, source_asset, source, target).await
}

/// Step 2: ask the target whether it already has this checksum, and if
/// so, extract the id to link. `Ok(None)` means "no duplicate reported",
/// `Err` means the probe itself failed and the caller should fall back
/// to copy without treating it as a task error.
async fn try_link<C: RemoteApi>(
    task: &Task,
    source_asset: &Asset,
    target: &C,
) -> crate::error::Result<Option<String>> {
    let body = target.check_bulk_upload(&task.checksum).await?;
    let _ = source_asset;
    Ok(extract_duplicate_id(&body))
}

/// Parses a `check_bulk_upload` response body looking for an entry whose
/// `action`/`status` marks it a duplicate.
fn extract_duplicate_id(body: &Value) -> Option<String> {
    let entries = body
        .get("results")
        .or_else(|| body.get("assets"))
        .and_then(Value::as_array)?;

    for entry in entries {
        let marker = entry
            .get("action")
            .or_else(|| entry.get("status"))
            .and_then(Value::as_str)
            .unwrap_or("");
        if marker != "reject" && marker != "duplicate" {
            continue;
        }
        let id = entry
            .get("assetId")
            .or_else(|| entry.get("existingId"))
            .or_else(|| entry.get("id"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        if let Some(id) = id {
            return Some(id.to_string());
        }
    }
    None
}

async fn run_copy<C: RemoteApi>(
    task: Task,
    source_asset: Asset,
    source: &C,
    target: &C,
) -> TaskOutcome {
    let content = match source.download_asset(&source_asset.id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return TaskOutcome::Failed {
                task,
                message: e.to_string(),
            };
        }
    };

    // Size gate B: only relevant when the source never reported a size.
    if source_asset.size.is_none()
        && let Some(limit) = target.size_limit_bytes()
        && content.len() as u64 > limit
    {
        let filename = filename_for(&source_asset);
        return TaskOutcome::Oversized {
            task,
            filename,
            size: content.len() as u64,
        };
    }

    let metadata = upload_metadata(&source_asset, source.name());
    let filename = filename_for(&source_asset);
    let checksum = task.checksum.clone();

    let new_id = match target
        .upload_asset(&filename, content, &metadata, Some(&checksum))
        .await
    {
        Ok(id) => id,
        Err(e) => {
            return TaskOutcome::Failed {
                task,
                message: e.to_string(),
            };
        }
    };

    if let Err(e) = target.add_assets_to_album(&[new_id.clone()]).await {
        return TaskOutcome::Failed {
            task,
            message: e.to_string(),
        };
    }

    TaskOutcome::Copied {
        task,
        remote_asset_id: new_id,
    }
}

fn filename_for(asset: &Asset) -> String {
    asset
        .original_filename
        .clone()
        .unwrap_or_else(|| format!("asset_{}", asset.checksum))
}

fn upload_metadata(asset: &Asset, source_name: &str) -> UploadMetadata {
    let device_asset_id = asset
        .device_asset_id
        .clone()
        .or_else(|| asset.original_filename.clone())
        .unwrap_or_else(|| format!("{source_name}-{}", asset.checksum));
    let device_id = asset
        .device_id
        .clone()
        .unwrap_or_else(|| format!("ImmichSync-{source_name}"));
    let file_created_at = asset.file_created_at.clone().unwrap_or_default();
    let file_modified_at = asset
        .file_modified_at
        .clone()
        .unwrap_or_else(|| file_created_at.clone());

    UploadMetadata {
        device_asset_id,
        device_id,
        file_created_at,
        file_modified_at,
    }
}

/// Bounded-concurrency driver for a batch of tasks against a fixed set of
/// named clients. Generic over [`RemoteApi`] so tests can drive it with a
/// fake implementation.
pub struct ConcurrencyHarness<C: RemoteApi> {
    clients: HashMap<String, Arc<C>>,
    semaphore: Arc<Semaphore>,
    rate_limiter: Option<Arc<DirectRateLimiter>>,
    cancelled: Arc<AtomicBool>,
}

impl<C: RemoteApi + 'static> ConcurrencyHarness<C> {
    pub fn new(
        clients: HashMap<String, Arc<C>>,
        workers: usize,
        requests_per_sec: Option<u32>,
    ) -> Self {
        Self::with_cancellation(clients, workers, requests_per_sec, None)
    }

    /// Like [`Self::new`], but lets the caller supply the cancellation
    /// flag instead of owning a fresh one — needed so a collaborator
    /// (e.g. the CLI's SIGINT handler) can request cooperative
    /// cancellation from outside the harness.
    pub fn with_cancellation(
        clients: HashMap<String, Arc<C>>,
        workers: usize,
        requests_per_sec: Option<u32>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        let rate_limiter = requests_per_sec.map(|rps| {
            let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or_else(|| {
                nonzero_ext::nonzero!(1u32)
            }));
            Arc::new(RateLimiter::direct(quota))
        });

        Self {
            clients,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            rate_limiter,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    /// A clone of the cancellation flag; the CLI's SIGINT handler sets it.
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Runs every task to completion (success, error, or oversize),
    /// applying each outcome to `index`, `summary` bookkeeping (via the
    /// supplied closures, under their own locks) as it lands, bounded to
    /// `workers` in-flight transfers across all targets combined.
    pub async fn run_all(
        &self,
        tasks: Vec<(Task, Asset)>,
        dry_run: bool,
        progress: ProgressHandle,
        presence: Option<Arc<dyn PresenceSink>>,
    ) -> Vec<TaskOutcome> {
        let mut handles = Vec::with_capacity(tasks.len());

        for (task, source_asset) in tasks {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }

            let Some(source) = self.clients.get(&task.source).cloned() else {
                handles.push(tokio::spawn(async move {
                    TaskOutcome::Failed {
                        message: format!("unknown source server {}", task.source),
                        task,
                    }
                }));
                continue;
            };
            let Some(target) = self.clients.get(&task.target).cloned() else {
                handles.push(tokio::spawn(async move {
                    TaskOutcome::Failed {
                        message: format!("unknown target server {}", task.target),
                        task,
                    }
                }));
                continue;
            };

            let semaphore = self.semaphore.clone();
            let rate_limiter = self.rate_limiter.clone();
            let cancelled = self.cancelled.clone();
            let progress = progress.clone();
            let presence = presence.clone();

            handles.push(tokio::spawn(async move {
                if cancelled.load(Ordering::SeqCst) {
                    return TaskOutcome::Failed {
                        message: "cancelled before start".to_string(),
                        task,
                    };
                }
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                if let Some(limiter) = &rate_limiter {
                    limiter.until_ready().await;
                }

                let outcome = run_task(task, source_asset, source.as_ref(), target.as_ref(), dry_run).await;
                progress.record(&outcome);
                if let Some(sink) = presence.as_ref() {
                    notify_presence(sink.as_ref(), &outcome);
                }
                outcome
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => outcomes.push(TaskOutcome::Failed {
                    task: Task::new("", "", ""),
                    message: format!("task panicked: {join_error}"),
                }),
            }
        }
        outcomes
    }
}

fn notify_presence(sink: &dyn PresenceSink, outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::Linked {
            task,
            remote_asset_id,
        } if !remote_asset_id.is_empty() => {
            sink.record_linked(&task.target, &task.checksum, remote_asset_id);
        }
        TaskOutcome::Copied {
            task,
            remote_asset_id,
        } if !remote_asset_id.is_empty() => {
            sink.record_copied(&task.target, &task.checksum, remote_asset_id);
        }
        _ => {}
    }
}
