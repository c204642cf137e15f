//! The uniform get/set/clear/info facade over whichever backend was selected.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;

use super::backend::{select_backend, BackendKind, CacheBackend};
use super::entry::{CacheEntry, EntrySummary};

/// Observability report for the cache as a whole.
#[derive(Debug, Serialize)]
pub struct CacheInfo {
    pub backend: &'static str,
    pub total_entries: usize,
    pub entries: Vec<EntrySummary>,
}

/// Uniform cache interface over Redis, local files, or no cache at all.
///
/// Construct one per process and share it via `Arc`; all operations are safe
/// to interleave across tasks. There is no global lock: per-key atomicity
/// comes from the backend itself, and unrelated keys never block each other.
pub struct CacheStore {
    backend: Box<dyn CacheBackend>,
}

impl CacheStore {
    /// Select a backend from the environment and build the store around it.
    pub async fn new(config: &Config) -> Result<Self> {
        let backend = select_backend(config).await?;
        Ok(Self { backend })
    }

    /// Build a store around an explicit backend. Useful for tests and for
    /// callers that make their own selection.
    pub fn with_backend(backend: Box<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Look up `key`. With `ttl_hours = None` a stored entry is permanent
    /// and returned regardless of age; otherwise an entry older than the TTL
    /// is deleted and reported as a miss.
    pub async fn get(&self, key: &str, ttl_hours: Option<u64>) -> Option<Value> {
        let Some(entry) = self.backend.load(key).await else {
            debug!("Cache miss ({}): {key}", self.backend.kind());
            return None;
        };

        if entry.is_expired(ttl_hours) {
            debug!("Cache expired ({}): {key}", self.backend.kind());
            self.backend.remove(key).await;
            return None;
        }

        debug!(
            "Cache hit ({}): {key} (age: {} minutes)",
            self.backend.kind(),
            entry.age_minutes()
        );
        Some(entry.data)
    }

    /// Store `payload` under `key`, replacing any existing entry wholesale
    /// and stamping a fresh `cached_at`.
    pub async fn set(&self, key: &str, payload: Value, metadata: Option<Map<String, Value>>) {
        let entry = CacheEntry::new(key, payload, metadata);
        self.backend.store(&entry).await;
    }

    /// Delete entries. With no pattern, everything goes; with a pattern,
    /// any entry whose key *contains* the pattern goes.
    ///
    /// Sharp edge: matching is by substring, not glob or regex, for
    /// compatibility with existing callers — `clear("tea")` also clears
    /// `"teams"`. Pass the longest prefix you mean.
    pub async fn clear(&self, pattern: Option<&str>) -> usize {
        self.backend.clear(pattern).await
    }

    /// Best-effort report of what the cache holds. Never fails on corrupt
    /// entries; they are simply absent from the list.
    pub async fn info(&self) -> CacheInfo {
        let entries = self.backend.entries().await;
        CacheInfo {
            backend: self.backend.kind().as_str(),
            total_entries: entries.len(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::file::FileCache;
    use crate::cache::noop::NoCache;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn file_store() -> (tempfile::TempDir, CacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileCache::new(dir.path().to_path_buf()).unwrap();
        (dir, CacheStore::with_backend(Box::new(backend)))
    }

    /// Rewrite an entry's file with a backdated `cached_at`.
    fn backdate(dir: &std::path::Path, file_stem: &str, hours: i64) {
        let path = dir.join(format!("{file_stem}.json"));
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut entry: CacheEntry = serde_json::from_str(&contents).unwrap();
        entry.cached_at = (Utc::now() - Duration::hours(hours)).timestamp();
        std::fs::write(&path, serde_json::to_string_pretty(&entry).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let (_dir, store) = file_store();
        store.set("k", json!({"rows": [1, 2]}), None).await;
        assert_eq!(store.get("k", None).await, Some(json!({"rows": [1, 2]})));
    }

    #[tokio::test]
    async fn test_ttl_expiry_deletes_entry() {
        let (dir, store) = file_store();
        store.set("k", json!(1), None).await;
        backdate(dir.path(), "k", 7);

        assert!(store.get("k", Some(6)).await.is_none());
        // Lazy deletion: the expired entry is gone from info() too.
        assert_eq!(store.info().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_permanent_entry_survives_any_age() {
        let (dir, store) = file_store();
        store.set("k", json!("old"), None).await;
        backdate(dir.path(), "k", 24 * 365);

        assert_eq!(store.get("k", None).await, Some(json!("old")));
    }

    #[tokio::test]
    async fn test_set_replaces_wholesale() {
        let (_dir, store) = file_store();
        store.set("k", json!({"a": 1, "b": 2}), None).await;
        store.set("k", json!({"a": 9}), None).await;
        assert_eq!(store.get("k", None).await, Some(json!({"a": 9})));
    }

    #[tokio::test]
    async fn test_pattern_clear_is_substring() {
        let (_dir, store) = file_store();
        store.set("egypt_teams_matches", json!(1), None).await;
        store.set("egypt_teams_players", json!(2), None).await;
        store.set("other", json!(3), None).await;

        store.clear(Some("egypt_teams")).await;

        assert!(store.get("egypt_teams_matches", None).await.is_none());
        assert!(store.get("egypt_teams_players", None).await.is_none());
        assert_eq!(store.get("other", None).await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_nocache_set_then_get_misses() {
        let store = CacheStore::with_backend(Box::new(NoCache));
        store.set("k", json!(1), None).await;
        assert!(store.get("k", None).await.is_none());
        assert_eq!(store.info().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_corruption_self_heal() {
        let (dir, store) = file_store();
        std::fs::write(dir.path().join("mangled.json"), "{{{{").unwrap();

        assert!(store.get("mangled", None).await.is_none());
        assert!(!dir.path().join("mangled.json").exists());
    }

    #[tokio::test]
    async fn test_info_lists_entries_with_ages() {
        let (_dir, store) = file_store();
        store.set("a", json!(1), None).await;
        store.set("b", json!(2), None).await;

        let info = store.info().await;
        assert_eq!(info.backend, "File");
        assert_eq!(info.total_entries, 2);
        assert!(info.entries.iter().all(|e| e.age_minutes <= 1));
    }
}
