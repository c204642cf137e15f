//! No-cache mode for serverless hosts with no local disk and no Redis.
//!
//! Reads always miss and writes are no-ops, so callers fall through to the
//! remote source every time. Correctness is preserved; latency and upstream
//! quota are the price of statelessness.

use async_trait::async_trait;
use tracing::debug;

use super::backend::{BackendKind, CacheBackend};
use super::entry::{CacheEntry, EntrySummary};

pub struct NoCache;

#[async_trait]
impl CacheBackend for NoCache {
    fn kind(&self) -> BackendKind {
        BackendKind::NoCache
    }

    async fn load(&self, _key: &str) -> Option<CacheEntry> {
        None
    }

    async fn store(&self, entry: &CacheEntry) {
        debug!("No-cache mode: skipping store of {}", entry.key);
    }

    async fn remove(&self, _key: &str) {}

    async fn clear(&self, _pattern: Option<&str>) -> usize {
        0
    }

    async fn entries(&self) -> Vec<EntrySummary> {
        Vec::new()
    }
}
