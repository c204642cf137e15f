//! Redis-backed cache.
//!
//! Each entry is stored as one JSON blob under its key, so the backend
//! inherits Redis's per-key atomicity. Connection trouble on an individual
//! operation degrades to a miss or no-op with a logged error; backend
//! selection already decided Redis was reachable at startup.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, error, warn};

use super::backend::{BackendKind, CacheBackend};
use super::entry::{CacheEntry, EntrySummary};

pub struct RedisCache {
    // Clone is cheap: a multiplexed connection shares one underlying socket.
    conn: MultiplexedConnection,
}

impl RedisCache {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    async fn scan_keys(&self) -> Vec<String> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        match conn.scan::<String>().await {
            Ok(mut iter) => {
                while let Some(key) = iter.next_item().await {
                    keys.push(key);
                }
            }
            Err(e) => error!("Redis SCAN failed: {e}"),
        }
        keys
    }

    async fn fetch_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut conn = self.conn.clone();
        let blob: Option<String> = match conn.get(key).await {
            Ok(v) => v,
            Err(e) => {
                error!("Redis GET failed for {key}: {e}");
                return None;
            }
        };
        let blob = blob?;

        match serde_json::from_str(&blob) {
            Ok(entry) => Some(entry),
            Err(e) => {
                // Self-heal: drop the unreadable blob and report a miss.
                warn!("Corrupt Redis entry for {key} ({e}), removing");
                let _: Result<usize, _> = conn.del(key).await;
                None
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn load(&self, key: &str) -> Option<CacheEntry> {
        self.fetch_entry(key).await
    }

    async fn store(&self, entry: &CacheEntry) {
        let blob = match serde_json::to_string(entry) {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {e}", entry.key);
                return;
            }
        };
        let mut conn = self.conn.clone();
        match conn.set::<_, _, ()>(&entry.key, blob).await {
            Ok(()) => debug!("Cached (Redis): {}", entry.key),
            Err(e) => error!("Redis SET failed for {}: {e}", entry.key),
        }
    }

    async fn remove(&self, key: &str) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn.del::<_, usize>(key).await {
            error!("Redis DEL failed for {key}: {e}");
        }
    }

    async fn clear(&self, pattern: Option<&str>) -> usize {
        // Filter scanned keys client-side so `pattern` is always a plain
        // substring, never interpreted as a glob.
        let keys: Vec<String> = self
            .scan_keys()
            .await
            .into_iter()
            .filter(|k| matches_pattern(k, pattern))
            .collect();

        let mut conn = self.conn.clone();
        let mut count = 0;
        for key in keys {
            match conn.del::<_, usize>(&key).await {
                Ok(n) => count += n,
                Err(e) => error!("Redis DEL failed for {key}: {e}"),
            }
        }
        debug!("Cleared {count} Redis cache entries (pattern: {pattern:?})");
        count
    }

    async fn entries(&self) -> Vec<EntrySummary> {
        let mut summaries = Vec::new();
        for key in self.scan_keys().await {
            if let Some(entry) = self.fetch_entry(&key).await {
                summaries.push(EntrySummary::from_entry(&entry, None));
            }
        }
        summaries
    }
}

fn matches_pattern(key: &str, pattern: Option<&str>) -> bool {
    match pattern {
        None => true,
        Some(p) => key.contains(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_substring_not_glob() {
        assert!(matches_pattern("egypt_teams_matches", Some("egypt_teams")));
        assert!(matches_pattern("has_teams_inside", Some("teams")));
        // Glob metacharacters have no special meaning.
        assert!(!matches_pattern("egypt_teams", Some("egypt*")));
        assert!(matches_pattern("literal*key", Some("al*k")));
    }

    #[test]
    fn test_no_pattern_matches_everything() {
        assert!(matches_pattern("anything", None));
    }
}
