//! Environment-driven configuration.
//!
//! Everything the cache and sync layers need is resolved from the process
//! environment once, at construction time. [`Config::load`] also picks up a
//! `.env` file; [`Config::from_env`] reads the environment as-is.

use std::path::PathBuf;

use anyhow::Result;

/// Application name used for the default cache directory path
const APP_NAME: &str = "sheetcache";

/// Default sync interval in hours
const DEFAULT_SYNC_INTERVAL_HOURS: u64 = 6;

/// Default TTL for the synced snapshot in hours
const DEFAULT_SYNC_TTL_HOURS: u64 = 6;

#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection string (`REDIS_URL`, falling back to `KV_URL`).
    /// Presence enables Redis mode if the server answers a ping.
    pub redis_url: Option<String>,

    /// Serverless / no-local-disk flag (`VERCEL=1`). With no reachable Redis
    /// this puts the cache into no-cache mode.
    pub serverless: bool,

    /// Explicit cache directory override (`SHEETCACHE_DIR`).
    pub cache_dir: Option<PathBuf>,

    /// Inline credential blob (`GOOGLE_CREDENTIALS_JSON_AHLY_MATCH` first,
    /// then `GOOGLE_CREDENTIALS_JSON`). Checked before the credential file.
    pub credentials_json: Option<String>,

    /// Path to a credential file (`GOOGLE_CREDENTIALS_FILE`).
    pub credentials_file: PathBuf,

    /// Remote source endpoint URL (`SHEETS_ENDPOINT_URL`).
    pub endpoint_url: Option<String>,

    /// How often the scheduler resyncs, in hours (`SYNC_INTERVAL_HOURS`).
    pub sync_interval_hours: u64,

    /// TTL applied to the synced snapshot, in hours (`SYNC_TTL_HOURS`).
    /// `None` (the literal value `permanent`) means the snapshot never
    /// expires by age.
    pub sync_ttl_hours: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            serverless: false,
            cache_dir: None,
            credentials_json: None,
            credentials_file: PathBuf::from("credentials/service_account.json"),
            endpoint_url: None,
            sync_interval_hours: DEFAULT_SYNC_INTERVAL_HOURS,
            sync_ttl_hours: Some(DEFAULT_SYNC_TTL_HOURS),
        }
    }
}

impl Config {
    /// Load a `.env` file if one is present, then read the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            redis_url: env_var("REDIS_URL").or_else(|| env_var("KV_URL")),
            serverless: env_var("VERCEL").as_deref() == Some("1"),
            cache_dir: env_var("SHEETCACHE_DIR").map(PathBuf::from),
            credentials_json: env_var("GOOGLE_CREDENTIALS_JSON_AHLY_MATCH")
                .or_else(|| env_var("GOOGLE_CREDENTIALS_JSON")),
            credentials_file: env_var("GOOGLE_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_file),
            endpoint_url: env_var("SHEETS_ENDPOINT_URL"),
            sync_interval_hours: env_var("SYNC_INTERVAL_HOURS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SYNC_INTERVAL_HOURS),
            sync_ttl_hours: match env_var("SYNC_TTL_HOURS").as_deref() {
                None => Some(DEFAULT_SYNC_TTL_HOURS),
                Some("permanent") => None,
                Some(v) => v.parse().ok().or(Some(DEFAULT_SYNC_TTL_HOURS)),
            },
        }
    }

    /// Directory used by the file backend. Falls back to the platform cache
    /// directory when no override is configured.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("cache"))
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
