//! Bulk synchronization from the remote source into the cache.
//!
//! One sync run fetches every table the source exposes and writes the result
//! into the cache as a single versioned snapshot. The snapshot is
//! all-or-nothing: a run that cannot authenticate or cannot enumerate tables
//! leaves whatever was cached before untouched, so callers keep seeing
//! stale-but-available data over nothing at all.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map};
use tracing::{error, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::source::{Credentials, Record, RemoteSource, SourceClient, SourceError};

/// Fixed cache key the snapshot lives under.
pub const SNAPSHOT_CACHE_KEY: &str = "ahly_stats_all_sheets";

/// All tables as of one fetch: table name to its rows.
pub type SyncSnapshot = BTreeMap<String, Vec<Record>>;

/// Result of [`SyncService::get_sync_status`].
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub cache_backend: &'static str,
    pub is_cached: bool,
    pub last_sync: Option<String>,
    pub age_minutes: Option<i64>,
    pub next_sync_in_hours: Option<f64>,
}

/// Orchestrates remote fetches and cache population.
pub struct SyncService {
    cache: Arc<CacheStore>,
    source: Box<dyn RemoteSource>,
    config: Config,
    last_sync_time: Mutex<Option<DateTime<Utc>>>,
}

impl SyncService {
    pub fn new(
        cache: Arc<CacheStore>,
        source: Box<dyn RemoteSource>,
        config: Config,
    ) -> Self {
        Self {
            cache,
            source,
            config,
            last_sync_time: Mutex::new(None),
        }
    }

    /// When the last successful sync of this process finished, if any.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.last_sync_time.lock().expect("last_sync_time lock poisoned")
    }

    /// Resolve credentials (inline env blob first, then the credential file)
    /// and authenticate against the remote source.
    pub async fn authenticate(&self) -> Result<Box<dyn SourceClient>, SourceError> {
        let credentials = Credentials::resolve(&self.config)?;
        self.source.authenticate(&credentials).await
    }

    /// Read every table the source exposes. One table failing to read is
    /// logged and mapped to an empty row set; only a failure to enumerate
    /// tables at all aborts the fetch.
    pub async fn fetch_all_tables(
        &self,
        client: &dyn SourceClient,
    ) -> Result<SyncSnapshot, SourceError> {
        let tables = client.list_tables().await?;

        let mut snapshot = SyncSnapshot::new();
        for name in tables {
            match client.read_table(&name).await {
                Ok(rows) => {
                    info!("Fetched {} records from table: {name}", rows.len());
                    snapshot.insert(name, rows);
                }
                Err(e) => {
                    warn!("Skipping table {name}: {e}");
                    snapshot.insert(name, Vec::new());
                }
            }
        }
        Ok(snapshot)
    }

    /// Run a full sync: authenticate, fetch all tables, write the snapshot
    /// to the cache under [`SNAPSHOT_CACHE_KEY`]. Returns the snapshot on
    /// success. Any failure is logged and yields `None` with the previously
    /// cached snapshot left as it was.
    pub async fn sync_to_cache(&self) -> Option<SyncSnapshot> {
        info!("Starting sync from remote source");
        let started = std::time::Instant::now();

        let client = match self.authenticate().await {
            Ok(client) => client,
            Err(e) => {
                error!("Sync failed during authentication: {e}");
                return None;
            }
        };

        let snapshot = match self.fetch_all_tables(client.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Sync failed during fetch: {e}");
                return None;
            }
        };

        let metadata = snapshot_metadata(&snapshot);
        let payload = match serde_json::to_value(&snapshot) {
            Ok(v) => v,
            Err(e) => {
                error!("Sync failed serializing snapshot: {e}");
                return None;
            }
        };
        self.cache.set(SNAPSHOT_CACHE_KEY, payload, Some(metadata)).await;

        let now = Utc::now();
        *self.last_sync_time.lock().expect("last_sync_time lock poisoned") = Some(now);

        info!(
            "Sync completed in {:.2}s ({} tables)",
            started.elapsed().as_secs_f64(),
            snapshot.len()
        );
        Some(snapshot)
    }

    /// The cached snapshot, if one exists and is within the configured TTL.
    pub async fn get_cached(&self) -> Option<SyncSnapshot> {
        let value = self
            .cache
            .get(SNAPSHOT_CACHE_KEY, self.config.sync_ttl_hours)
            .await?;
        match serde_json::from_value(value) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Cached snapshot has unexpected shape ({e}), ignoring");
                None
            }
        }
    }

    /// Serve from the cache, or sync on a miss. The fresh data is returned
    /// directly, so callers get it even in no-cache mode where nothing was
    /// actually persisted.
    pub async fn get_or_sync(&self) -> Option<SyncSnapshot> {
        if let Some(cached) = self.get_cached().await {
            return Some(cached);
        }
        info!("Snapshot cache miss, syncing from remote source");
        self.sync_to_cache().await
    }

    /// Current sync state, derived purely from cache observability data.
    /// Never triggers a fetch.
    pub async fn get_sync_status(&self) -> SyncStatus {
        let info = self.cache.info().await;
        let entry = info.entries.iter().find(|e| e.key == SNAPSHOT_CACHE_KEY);

        let mut status = SyncStatus {
            cache_backend: info.backend,
            is_cached: entry.is_some(),
            last_sync: None,
            age_minutes: None,
            next_sync_in_hours: None,
        };

        if let Some(entry) = entry {
            status.last_sync = Some(entry.cached_at.clone());
            status.age_minutes = Some(entry.age_minutes);
            if let Some(ttl) = self.config.sync_ttl_hours {
                let age_hours = entry.age_minutes as f64 / 60.0;
                let remaining = (ttl as f64 - age_hours).max(0.0);
                status.next_sync_in_hours = Some((remaining * 10.0).round() / 10.0);
            }
        }
        status
    }
}

fn snapshot_metadata(snapshot: &SyncSnapshot) -> Map<String, serde_json::Value> {
    let mut metadata = Map::new();
    metadata.insert("sheets_count".into(), json!(snapshot.len()));
    metadata.insert(
        "sheet_names".into(),
        json!(snapshot.keys().collect::<Vec<_>>()),
    );
    metadata.insert("sync_timestamp".into(), json!(Utc::now().to_rfc3339()));
    metadata.insert(
        "records_count".into(),
        json!(snapshot
            .iter()
            .map(|(name, rows)| (name.clone(), rows.len()))
            .collect::<BTreeMap<_, _>>()),
    );
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::file::FileCache;
    use crate::cache::noop::NoCache;
    use crate::sync::testing::{FakeSource, FakeSourcePlan};
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            // The fake source ignores credentials, but resolution still runs.
            credentials_json: Some("{}".to_string()),
            sync_ttl_hours: Some(6),
            ..Config::default()
        }
    }

    fn file_service(plan: FakeSourcePlan) -> (tempfile::TempDir, SyncService) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileCache::new(dir.path().to_path_buf()).unwrap();
        let cache = Arc::new(CacheStore::with_backend(Box::new(backend)));
        let service = SyncService::new(cache, Box::new(FakeSource::new(plan)), test_config());
        (dir, service)
    }

    fn two_table_plan() -> FakeSourcePlan {
        FakeSourcePlan::default()
            .with_table("MATCHDETAILS", vec![json!({"opponent": "Zamalek"})])
            .with_table("PLAYERDETAILS", vec![json!({"player": "Aboutrika"})])
    }

    #[tokio::test]
    async fn test_sync_writes_snapshot_and_metadata() {
        let (_dir, service) = file_service(two_table_plan());

        let snapshot = service.sync_to_cache().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(service.last_sync_time().is_some());

        let cached = service.get_cached().await.unwrap();
        assert_eq!(cached["MATCHDETAILS"][0]["opponent"], json!("Zamalek"));
    }

    #[tokio::test]
    async fn test_get_or_sync_uses_cache_without_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileCache::new(dir.path().to_path_buf()).unwrap();
        let cache = Arc::new(CacheStore::with_backend(Box::new(backend)));
        let source = FakeSource::new(two_table_plan());
        let fetches = source.list_calls();
        let service = SyncService::new(cache, Box::new(source), test_config());

        service.get_or_sync().await.unwrap();
        service.get_or_sync().await.unwrap();

        // One fetch total: the second call was a cache hit.
        assert_eq!(fetches.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_table_failure_keeps_other_tables() {
        let plan = two_table_plan().with_missing_table("GKDETAILS");
        let (_dir, service) = file_service(plan);

        let snapshot = service.sync_to_cache().await.unwrap();
        assert_eq!(snapshot["GKDETAILS"], Vec::<Record>::new());
        assert_eq!(snapshot["MATCHDETAILS"].len(), 1);
        assert_eq!(snapshot["PLAYERDETAILS"].len(), 1);
    }

    #[tokio::test]
    async fn test_total_failure_leaves_previous_snapshot() {
        let (dir, service) = file_service(two_table_plan());
        service.sync_to_cache().await.unwrap();

        // Same cache directory, but a source that cannot even list tables.
        let backend = FileCache::new(dir.path().to_path_buf()).unwrap();
        let cache = Arc::new(CacheStore::with_backend(Box::new(backend)));
        let broken = SyncService::new(
            cache,
            Box::new(FakeSource::new(FakeSourcePlan::default().with_list_failure())),
            test_config(),
        );

        assert!(broken.sync_to_cache().await.is_none());
        // The earlier snapshot is still served.
        assert!(broken.get_cached().await.is_some());
    }

    #[tokio::test]
    async fn test_auth_failure_returns_none() {
        let plan = two_table_plan().with_auth_failure();
        let (_dir, service) = file_service(plan);
        assert!(service.sync_to_cache().await.is_none());
        assert!(service.last_sync_time().is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_sync_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileCache::new(dir.path().to_path_buf()).unwrap();
        let cache = Arc::new(CacheStore::with_backend(Box::new(backend)));
        let config = Config {
            credentials_json: None,
            credentials_file: "/nonexistent/creds.json".into(),
            ..Config::default()
        };
        let service = SyncService::new(cache, Box::new(FakeSource::new(two_table_plan())), config);
        assert!(service.sync_to_cache().await.is_none());
    }

    #[tokio::test]
    async fn test_nocache_mode_still_returns_fresh_data() {
        let cache = Arc::new(CacheStore::with_backend(Box::new(NoCache)));
        let service = SyncService::new(
            cache.clone(),
            Box::new(FakeSource::new(two_table_plan())),
            test_config(),
        );

        let snapshot = service.get_or_sync().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        // Nothing was persisted.
        assert!(cache.get(SNAPSHOT_CACHE_KEY, None).await.is_none());
    }

    #[tokio::test]
    async fn test_sync_status_reflects_cached_snapshot() {
        let (_dir, service) = file_service(two_table_plan());

        let before = service.get_sync_status().await;
        assert!(!before.is_cached);
        assert!(before.next_sync_in_hours.is_none());

        service.sync_to_cache().await.unwrap();

        let after = service.get_sync_status().await;
        assert!(after.is_cached);
        assert_eq!(after.cache_backend, "File");
        assert_eq!(after.age_minutes, Some(0));
        assert_eq!(after.next_sync_in_hours, Some(6.0));
    }
}
