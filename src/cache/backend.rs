//! Backend selection and the storage trait the cache store dispatches on.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Config;

use super::entry::{CacheEntry, EntrySummary};
use super::file::FileCache;
use super::noop::NoCache;
use super::redis::RedisCache;

/// Timeout for the startup liveness probe against Redis, in seconds
const PING_TIMEOUT_SECS: u64 = 5;

/// The concrete storage medium chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    File,
    NoCache,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Redis => "Redis",
            BackendKind::File => "File",
            BackendKind::NoCache => "NoCache",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One storage implementation per [`BackendKind`].
///
/// Methods are infallible by contract: a backend that cannot read or write
/// logs the failure and degrades to a miss / no-op, so storage trouble never
/// propagates past the cache store.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Load the entry for `key`. Corrupt entries are removed and reported as
    /// a miss (self-healing).
    async fn load(&self, key: &str) -> Option<CacheEntry>;

    /// Store an entry, replacing any existing entry for the same key.
    async fn store(&self, entry: &CacheEntry);

    /// Remove the entry for `key`, if present.
    async fn remove(&self, key: &str);

    /// Remove every entry, or with a pattern only entries whose *key*
    /// contains it as a substring. Returns the number removed.
    async fn clear(&self, pattern: Option<&str>) -> usize;

    /// Best-effort enumeration for observability; corrupt entries are
    /// skipped, never an error.
    async fn entries(&self) -> Vec<EntrySummary>;
}

/// Decide which backend this process runs with. Called once, at cache store
/// construction.
///
/// Order: Redis if a connection string is configured and the server answers a
/// ping; otherwise no-cache mode on serverless hosts with no local disk;
/// otherwise the local file cache. A failed ping downgrades with a logged
/// warning rather than an error — cache availability is a performance
/// concern, not a correctness one, and that trade is deliberate.
pub async fn select_backend(config: &Config) -> Result<Box<dyn CacheBackend>> {
    if let Some(ref url) = config.redis_url {
        match probe_redis(url).await {
            Ok(backend) => {
                info!("Using Redis cache");
                return Ok(Box::new(backend));
            }
            Err(e) => {
                warn!("Redis not available ({e}), falling back");
            }
        }
    }

    if config.serverless {
        info!("Serverless environment detected: running in no-cache mode");
        return Ok(Box::new(NoCache));
    }

    let dir = config.cache_dir()?;
    let backend = FileCache::new(dir.clone())?;
    info!("Using file-based cache: {}", dir.display());
    Ok(Box::new(backend))
}

async fn probe_redis(url: &str) -> Result<RedisCache> {
    let client = redis::Client::open(url)?;
    let connect = client.get_multiplexed_async_connection();
    let mut conn = tokio::time::timeout(
        std::time::Duration::from_secs(PING_TIMEOUT_SECS),
        connect,
    )
    .await
    .map_err(|_| anyhow::anyhow!("connection timed out"))??;

    let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    if pong != "PONG" {
        anyhow::bail!("unexpected PING response: {pong}");
    }

    Ok(RedisCache::new(conn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serverless_without_redis_selects_nocache() {
        let config = Config {
            serverless: true,
            ..Config::default()
        };
        let backend = select_backend(&config).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::NoCache);
    }

    #[tokio::test]
    async fn test_default_selects_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let backend = select_backend(&config).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::File);
    }

    #[tokio::test]
    async fn test_unreachable_redis_downgrades_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            redis_url: Some("redis://127.0.0.1:1".to_string()),
            cache_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let backend = select_backend(&config).await.unwrap();
        assert_eq!(backend.kind(), BackendKind::File);
    }
}
