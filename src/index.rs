//! Content-addressed indexing of per-server asset lists.

use std::collections::HashMap;

use crate::models::Asset;

/// `server_name -> (checksum -> Asset)`. Inner keys are always non-empty;
/// checksumless assets are counted but never indexed.
#[derive(Debug, Clone, Default)]
pub struct Index {
    by_server: HashMap<String, HashMap<String, Asset>>,
}

impl Index {
    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.by_server.keys().map(String::as_str)
    }

    pub fn contains(&self, server: &str, checksum: &str) -> bool {
        self.by_server
            .get(server)
            .is_some_and(|m| m.contains_key(checksum))
    }

    pub fn get(&self, server: &str, checksum: &str) -> Option<&Asset> {
        self.by_server.get(server)?.get(checksum)
    }

    /// The set of checksums present on any server, in sorted order so
    /// downstream scheduling is deterministic.
    pub fn union_sorted(&self) -> Vec<String> {
        let mut set: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for inner in self.by_server.values() {
            set.extend(inner.keys().cloned());
        }
        set.into_iter().collect()
    }

    /// Records that `server` now holds `checksum`. Called only by the
    /// harness after a task completes; workers never mutate the index.
    pub fn insert(&mut self, server: &str, checksum: String, asset: Asset) {
        self.by_server
            .entry(server.to_string())
            .or_default()
            .insert(checksum, asset);
    }

    pub fn len_for(&self, server: &str) -> usize {
        self.by_server.get(server).map_or(0, HashMap::len)
    }
}

/// Builds the [`Index`] from each server's asset list, in input order.
/// When one server reports two assets sharing a checksum, the first one
/// seen wins and later duplicates are ignored.
///
/// Returns the index plus, per server, the count of assets skipped for
/// having no checksum.
pub fn build_index(assets_by_server: &HashMap<String, Vec<Asset>>) -> (Index, HashMap<String, usize>) {
    let mut index = Index::default();
    let mut checksumless = HashMap::new();

    for (server, assets) in assets_by_server {
        let inner = index.by_server.entry(server.clone()).or_default();
        let mut skipped = 0usize;
        for asset in assets {
            if asset.checksum.is_empty() {
                skipped += 1;
                continue;
            }
            inner.entry(asset.checksum.clone()).or_insert_with(|| asset.clone());
        }
        checksumless.insert(server.clone(), skipped);
    }

    (index, checksumless)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str, checksum: &str) -> Asset {
        Asset::new(id, checksum)
    }

    #[test]
    fn first_seen_wins_on_duplicate_checksum() {
        let mut assets_by_server = HashMap::new();
        assets_by_server.insert(
            "one".to_string(),
            vec![asset("1", "chk1"), asset("2", "chk1")],
        );
        let (index, _) = build_index(&assets_by_server);
        assert_eq!(index.get("one", "chk1").unwrap().id, "1");
    }

    #[test]
    fn checksumless_assets_are_counted_not_indexed() {
        let mut assets_by_server = HashMap::new();
        assets_by_server.insert(
            "one".to_string(),
            vec![asset("1", "chk1"), asset("2", "")],
        );
        assets_by_server.insert("two".to_string(), vec![asset("3", "chk2")]);
        let (index, checksumless) = build_index(&assets_by_server);
        assert_eq!(checksumless["one"], 1);
        assert_eq!(checksumless["two"], 0);
        assert_eq!(index.len_for("one"), 1);
        assert!(!index.contains("one", ""));
    }

    #[test]
    fn union_sorted_is_deterministic() {
        let mut assets_by_server = HashMap::new();
        assets_by_server.insert(
            "one".to_string(),
            vec![asset("1", "chk2"), asset("2", "chk1")],
        );
        let (index, _) = build_index(&assets_by_server);
        assert_eq!(index.union_sorted(), vec!["chk1".to_string(), "chk2".to_string()]);
    }
}
