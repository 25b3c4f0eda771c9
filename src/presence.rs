//! Hook into the collaborator-owned persisted-state schema.
//!
//! The engine does not define `asset_hashes`/`asset_presences` or their
//! storage; it only calls through this seam after each successful list
//! or copy. Kept synchronous (not `async fn`) so it stays usable as
//! `Option<Arc<dyn PresenceSink>>` without `async_trait`.
pub trait PresenceSink: Send + Sync {
    /// Called once per server after `list_album_assets` succeeds, with
    /// every checksum observed there.
    fn record_listed(&self, server: &str, checksums: &[String]) {
        let _ = (server, checksums);
    }

    /// Called when a task attached an asset to `server`'s album by
    /// linking an asset it already stored under `checksum`.
    fn record_linked(&self, server: &str, checksum: &str, remote_asset_id: &str) {
        let _ = (server, checksum, remote_asset_id);
    }

    /// Called when a task uploaded new bytes to `server` and attached
    /// the resulting asset to its album.
    fn record_copied(&self, server: &str, checksum: &str, remote_asset_id: &str) {
        let _ = (server, checksum, remote_asset_id);
    }
}

/// Default no-op sink used when a collaborator doesn't supply one.
pub struct NoopPresenceSink;

impl PresenceSink for NoopPresenceSink {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        linked: Mutex<Vec<(String, String, String)>>,
    }

    impl PresenceSink for RecordingSink {
        fn record_linked(&self, server: &str, checksum: &str, remote_asset_id: &str) {
            self.linked.lock().unwrap().push((
                server.to_string(),
                checksum.to_string(),
                remote_asset_id.to_string(),
            ));
        }
    }

    #[test]
    fn noop_sink_accepts_all_calls() {
        let sink = NoopPresenceSink;
        sink.record_listed("primary", &["chk1".to_string()]);
        sink.record_linked("secondary", "chk1", "id-1");
        sink.record_copied("secondary", "chk2", "id-2");
    }

    #[test]
    fn custom_sink_observes_link_events() {
        let sink = RecordingSink::default();
        sink.record_linked("secondary", "chk1", "id-1");
        assert_eq!(
            sink.linked.lock().unwrap()[0],
            ("secondary".to_string(), "chk1".to_string(), "id-1".to_string())
        );
    }
}
