//! End-to-end scenarios against a fake `RemoteApi`, no live HTTP.

use std::collections::HashMap;
use std::sync::Mutex;

use immich_sync::client::{RemoteApi, UploadMetadata};
use immich_sync::executor::run_task;
use immich_sync::index::build_index;
use immich_sync::models::{Asset, Task, TaskOutcome};
use immich_sync::reconcile::reconcile;
use serde_json::Value;

#[derive(Default)]
struct FakeInstance {
    name: String,
    size_limit_bytes: Option<u64>,
    assets: Vec<Asset>,
    download_bytes: HashMap<String, bytes::Bytes>,
    bulk_check_response: Value,
    uploads: Mutex<Vec<String>>,
    added_to_album: Mutex<Vec<String>>,
    upload_id: String,
}

impl RemoteApi for FakeInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_limit_bytes(&self) -> Option<u64> {
        self.size_limit_bytes
    }

    async fn list_album_assets(&self) -> immich_sync::Result<Vec<Asset>> {
        Ok(self.assets.clone())
    }

    async fn download_asset(&self, asset_id: &str) -> immich_sync::Result<bytes::Bytes> {
        Ok(self
            .download_bytes
            .get(asset_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upload_asset(
        &self,
        filename: &str,
        _content: bytes::Bytes,
        _metadata: &UploadMetadata,
        _checksum: Option<&str>,
    ) -> immich_sync::Result<String> {
        self.uploads.lock().unwrap().push(filename.to_string());
        Ok(self.upload_id.clone())
    }

    async fn add_assets_to_album(&self, ids: &[String]) -> immich_sync::Result<()> {
        self.added_to_album.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }

    async fn check_bulk_upload(&self, _checksum: &str) -> immich_sync::Result<Value> {
        Ok(self.bulk_check_response.clone())
    }
}

/// Scenario 1: "Copies missing" — primary has an asset, secondary is
/// empty. Expect one upload of "photo.jpg" and one add-to-album call with
/// the uploaded id.
#[tokio::test]
async fn copies_missing_asset_end_to_end() {
    let primary = FakeInstance {
        name: "primary".into(),
        assets: vec![Asset::new("asset-1", "chk1")
            .with_filename("photo.jpg")
            .with_size(123)],
        download_bytes: HashMap::from([(
            "asset-1".to_string(),
            bytes::Bytes::from_static(b"bytes"),
        )]),
        bulk_check_response: Value::Null,
        upload_id: "secondary-uploaded".into(),
        ..Default::default()
    };
    let secondary = FakeInstance {
        name: "secondary".into(),
        bulk_check_response: serde_json::json!({"results": []}),
        upload_id: "secondary-uploaded".into(),
        ..Default::default()
    };

    let mut by_server = HashMap::new();
    by_server.insert("primary".to_string(), primary.assets.clone());
    by_server.insert("secondary".to_string(), vec![]);
    let (index, _checksumless) = build_index(&by_server);

    let order = vec!["primary".to_string(), "secondary".to_string()];
    let (_missing, tasks, errors) = reconcile(&index, &order);
    assert!(errors.is_empty());
    assert_eq!(tasks.len(), 1);

    let task = tasks.into_iter().next().unwrap();
    let source_asset = index.get("primary", "chk1").cloned().unwrap();
    let outcome = run_task(task, source_asset, &primary, &secondary, false).await;

    match outcome {
        TaskOutcome::Copied { remote_asset_id, .. } => {
            assert_eq!(remote_asset_id, "secondary-uploaded");
        }
        other => panic!("expected Copied, got {other:?}"),
    }
    assert_eq!(
        *secondary.uploads.lock().unwrap(),
        vec!["photo.jpg".to_string()]
    );
    assert_eq!(
        *secondary.added_to_album.lock().unwrap(),
        vec!["secondary-uploaded".to_string()]
    );
}

/// Scenario 2: "Links existing" — the target's bulk-check reports a
/// duplicate, so the engine links instead of uploading.
#[tokio::test]
async fn links_existing_duplicate_end_to_end() {
    let primary = FakeInstance {
        name: "primary".into(),
        assets: vec![Asset::new("asset-1", "chk1").with_filename("photo.jpg")],
        ..Default::default()
    };
    let secondary = FakeInstance {
        name: "secondary".into(),
        bulk_check_response: serde_json::json!({
            "results": [{"action": "reject", "assetId": "existing-secondary-id"}]
        }),
        ..Default::default()
    };

    let task = Task::new("chk1", "primary", "secondary");
    let source_asset = primary.assets[0].clone();
    let outcome = run_task(task, source_asset, &primary, &secondary, false).await;

    match outcome {
        TaskOutcome::Linked { remote_asset_id, .. } => {
            assert_eq!(remote_asset_id, "existing-secondary-id");
        }
        other => panic!("expected Linked, got {other:?}"),
    }
    assert!(secondary.uploads.lock().unwrap().is_empty());
    assert_eq!(
        *secondary.added_to_album.lock().unwrap(),
        vec!["existing-secondary-id".to_string()]
    );
}

/// Scenario 4: "Oversize skip" — primary's asset exceeds secondary's
/// configured size limit, so no download or upload happens.
#[tokio::test]
async fn oversize_skip_end_to_end() {
    let primary = FakeInstance {
        name: "primary".into(),
        ..Default::default()
    };
    let secondary = FakeInstance {
        name: "secondary".into(),
        size_limit_bytes: Some(5_000),
        ..Default::default()
    };

    let task = Task::new("chk2", "primary", "secondary");
    let source_asset = Asset::new("asset-2", "chk2").with_size(10_000);
    let outcome = run_task(task, source_asset, &primary, &secondary, false).await;

    match outcome {
        TaskOutcome::Oversized { filename, size, .. } => {
            assert_eq!(size, 10_000);
            assert_eq!(filename, "asset_chk2");
        }
        other => panic!("expected Oversized, got {other:?}"),
    }
    assert!(secondary.uploads.lock().unwrap().is_empty());
    assert!(secondary.added_to_album.lock().unwrap().is_empty());
}

/// Scenario 6: "Index & missing" — checksumless assets are counted but
/// not indexed, and each server's missing set is exactly the union minus
/// what it already holds.
#[test]
fn index_and_missing_scenario() {
    let mut by_server = HashMap::new();
    by_server.insert(
        "one".to_string(),
        vec![Asset::new("1", "chk1"), Asset::new("2", "")],
    );
    by_server.insert("two".to_string(), vec![Asset::new("3", "chk2")]);

    let (index, checksumless) = build_index(&by_server);
    assert_eq!(checksumless["one"], 1);
    assert_eq!(checksumless["two"], 0);

    let order = vec!["one".to_string(), "two".to_string()];
    let (missing, _tasks, errors) = reconcile(&index, &order);
    assert_eq!(missing["one"], vec!["chk2".to_string()]);
    assert_eq!(missing["two"], vec!["chk1".to_string()]);
    assert!(errors.is_empty());
}

/// Union convergence (dry-run): after a dry-run sync, every union
/// checksum must be reachable from every server's perspective once the
/// index is updated with each task's outcome.
#[tokio::test]
async fn dry_run_converges_index_to_union() {
    let primary = FakeInstance {
        name: "primary".into(),
        assets: vec![Asset::new("1", "chk1")],
        ..Default::default()
    };
    let secondary = FakeInstance {
        name: "secondary".into(),
        assets: vec![Asset::new("2", "chk2")],
        ..Default::default()
    };

    let mut by_server = HashMap::new();
    by_server.insert("primary".to_string(), primary.assets.clone());
    by_server.insert("secondary".to_string(), secondary.assets.clone());
    let (mut index, _) = build_index(&by_server);

    let order = vec!["primary".to_string(), "secondary".to_string()];
    let (_missing, tasks, _errors) = reconcile(&index, &order);
    assert_eq!(tasks.len(), 2);

    for task in tasks {
        let source_asset = index.get(&task.source, &task.checksum).cloned().unwrap();
        let target = task.target.clone();
        let checksum = task.checksum.clone();
        let outcome = match target.as_str() {
            "primary" => run_task(task, source_asset.clone(), &secondary, &primary, true).await,
            "secondary" => run_task(task, source_asset.clone(), &primary, &secondary, true).await,
            _ => unreachable!(),
        };
        assert!(matches!(outcome, TaskOutcome::Copied { .. }));
        index.insert(&target, checksum, source_asset);
    }

    for server in &order {
        assert!(index.contains(server, "chk1"));
        assert!(index.contains(server, "chk2"));
    }
}
