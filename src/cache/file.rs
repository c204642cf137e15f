//! Local file-backed cache.
//!
//! One JSON file per key under the cache directory. Known key prefixes are
//! grouped under human-readable bucket names so the directory stays
//! navigable; the grouping is cosmetic and never affects lookup by key.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::backend::{BackendKind, CacheBackend};
use super::entry::{CacheEntry, EntrySummary};

/// Key prefixes mapped to bucket names for on-disk file naming. First match
/// wins, so more specific prefixes come before shorter ones they overlap.
const BUCKET_PREFIXES: &[(&str, &str)] = &[
    ("ahly_stats", "Al_Ahly_Stats"),
    ("pks_stats", "Al_Ahly_PKs"),
    ("finals_stats", "Al_Ahly_Finals"),
    ("finals_players", "Al_Ahly_Finals"),
    ("finals_lineup", "Al_Ahly_Finals"),
    ("finals_playerdatabase", "Al_Ahly_Finals"),
    ("ahly_vs_zamalek", "Ahly_vs_Zamalek"),
    ("egypt_teams", "Egypt_Teams"),
    ("youth_egypt", "Egypt_Youth"),
    ("ahly_players_list", "Al_Ahly_Stats"),
    ("egypt_players_list", "Egypt_Teams"),
    ("teams_list", "db_Teams_List"),
    ("stadiums_list", "db_Stadiums_List"),
    ("champions_list", "db_Champions_List"),
    ("managers_list", "db_Managers_List"),
    ("referees_list", "db_Referees_List"),
];

/// Sequence for temp file names, so concurrent writers never share one
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct FileCache {
    cache_dir: PathBuf,
}

impl FileCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", file_stem_for_key(key)))
    }

    fn read_entry(&self, path: &Path) -> Option<CacheEntry> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(entry) => Some(entry),
            Err(e) => {
                // Self-heal: an unreadable entry is a miss, not an error.
                warn!("Corrupt cache file {} ({e}), removing", path.display());
                let _ = fs::remove_file(path);
                None
            }
        }
    }

    fn cache_files(&self) -> Vec<PathBuf> {
        let Ok(dir) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        dir.filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect()
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn load(&self, key: &str) -> Option<CacheEntry> {
        let path = self.cache_path(key);
        if !path.exists() {
            return None;
        }
        let entry = self.read_entry(&path)?;
        // Sanitization can fold distinct keys onto one stem; the recorded
        // key decides ownership, and another key's entry is a miss, not a
        // hit and not something to delete.
        if entry.key != key {
            debug!(
                "Cache file {} belongs to key {}, not {key}: miss",
                path.display(),
                entry.key
            );
            return None;
        }
        Some(entry)
    }

    async fn store(&self, entry: &CacheEntry) {
        let path = self.cache_path(&entry.key);
        let contents = match serde_json::to_string_pretty(entry) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {e}", entry.key);
                return;
            }
        };

        // Write-then-rename so a concurrent reader never sees a torn file.
        // The temp name carries a sequence number: same-key writers may
        // race, and each must rename its own complete file.
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .cache_dir
            .join(format!(".{}.{seq}.tmp", file_stem_for_key(&entry.key)));
        if let Err(e) = fs::write(&tmp, contents) {
            warn!("Failed to write cache file {}: {e}", tmp.display());
            return;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            warn!("Failed to move cache file into place {}: {e}", path.display());
            let _ = fs::remove_file(&tmp);
        } else {
            debug!("Cached (File): {} -> {}", entry.key, path.display());
        }
    }

    async fn remove(&self, key: &str) {
        let path = self.cache_path(key);
        if !path.exists() {
            return;
        }
        // Never take out another key's entry over a stem collision.
        match self.read_entry(&path) {
            Some(entry) if entry.key != key => {}
            _ => {
                if path.exists() {
                    if let Err(e) = fs::remove_file(&path) {
                        warn!("Failed to remove cache file {}: {e}", path.display());
                    }
                }
            }
        }
    }

    async fn clear(&self, pattern: Option<&str>) -> usize {
        let mut count = 0;
        for path in self.cache_files() {
            let matches = match pattern {
                None => true,
                // Match on the key recorded inside the entry, not the
                // bucketed file name, so both backends clear identically.
                // A file we cannot parse is dead weight either way.
                Some(p) => self
                    .read_entry(&path)
                    .is_some_and(|entry| entry.key.contains(p)),
            };
            if matches && path.exists() && fs::remove_file(&path).is_ok() {
                count += 1;
            }
        }
        debug!("Cleared {count} file cache entries (pattern: {pattern:?})");
        count
    }

    async fn entries(&self) -> Vec<EntrySummary> {
        let mut summaries = Vec::new();
        for path in self.cache_files() {
            // Best effort: skip anything unreadable rather than failing the
            // whole report.
            let Ok(contents) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(entry) = serde_json::from_str::<CacheEntry>(&contents) else {
                continue;
            };
            let size = fs::metadata(&path).ok().map(|m| m.len());
            summaries.push(EntrySummary::from_entry(&entry, size));
        }
        summaries
    }
}

/// Compute the on-disk file stem for a key.
///
/// Keys starting with a known bucket prefix become `<bucket>__<key>` so
/// related entries sort together in the directory; anything else is the key
/// with unsafe characters replaced by `_`. The full key stays in the stem
/// because several prefixes share a bucket (`ahly_stats` and
/// `ahly_players_list` both file under `Al_Ahly_Stats`), and distinct keys
/// must never land on the same file.
fn file_stem_for_key(key: &str) -> String {
    for (prefix, bucket) in BUCKET_PREFIXES {
        if key.starts_with(prefix) {
            return format!("{bucket}__{}", sanitize(key));
        }
    }
    sanitize(key)
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
