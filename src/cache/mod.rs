//! Hybrid caching module.
//!
//! A uniform get/set/clear/info facade over three interchangeable backends:
//! - `Redis` when a connection string is configured and the server is up
//! - `File` (one JSON file per key under the platform cache directory)
//! - `NoCache` on serverless hosts, where every read is a miss
//!
//! Backend selection happens once, at [`CacheStore`] construction, and a
//! failed Redis probe downgrades with a warning rather than an error.

pub mod backend;
pub mod entry;
pub mod file;
pub mod noop;
pub mod redis;
pub mod store;

pub use backend::{select_backend, BackendKind, CacheBackend};
pub use entry::{CacheEntry, EntrySummary};
pub use store::{CacheInfo, CacheStore};
