use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The unit of storage, and the exact JSON layout persisted by the file
/// backend and stored under a Redis key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Seconds since the Unix epoch, set at write time. Refreshed only by a
    /// `set`; a `get` never mutates it.
    pub cached_at: i64,
    /// RFC 3339 copy of `cached_at`, for humans poking at cache files.
    pub cached_at_readable: String,
    pub data: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl CacheEntry {
    pub fn new(key: &str, data: Value, metadata: Option<Map<String, Value>>) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            cached_at: now.timestamp(),
            cached_at_readable: now.to_rfc3339(),
            data,
            metadata: metadata.unwrap_or_default(),
        }
    }

    pub fn age_seconds(&self) -> i64 {
        Utc::now().timestamp() - self.cached_at
    }

    pub fn age_minutes(&self) -> i64 {
        self.age_seconds() / 60
    }

    /// `None` means permanent: the entry never expires by age.
    pub fn is_expired(&self, ttl_hours: Option<u64>) -> bool {
        match ttl_hours {
            None => false,
            Some(hours) => self.age_seconds() > (hours as i64) * 3600,
        }
    }
}

/// Per-entry line in a [`CacheInfo`](super::CacheInfo) report.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub key: String,
    pub age_minutes: i64,
    pub cached_at: String,
    /// Stored size in kilobytes, where the backend can report it cheaply.
    pub size_kb: Option<f64>,
}

impl EntrySummary {
    pub fn from_entry(entry: &CacheEntry, size_bytes: Option<u64>) -> Self {
        Self {
            key: entry.key.clone(),
            age_minutes: entry.age_minutes(),
            cached_at: entry.cached_at_readable.clone(),
            size_kb: size_bytes.map(|b| b as f64 / 1024.0),
        }
    }
}
