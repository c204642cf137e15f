//! sheetcache - hybrid cache layer with a background refresh scheduler.
//!
//! Sits in front of a slow, rate-limited spreadsheet-backed API and absorbs
//! expensive upstream reads behind a uniform get/set/clear interface. The
//! cache transparently targets Redis, the local disk, or nothing at all
//! depending on the environment, and a designated snapshot of every remote
//! table is kept warm by a periodic background sync.
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use sheetcache::{CacheStore, Config, HttpSource, Scheduler, SyncService};
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let config = Config::load();
//! let cache = Arc::new(CacheStore::new(&config).await?);
//!
//! let endpoint = config.endpoint_url.clone().expect("SHEETS_ENDPOINT_URL not set");
//! let source = HttpSource::new(endpoint)?;
//! let sync = Arc::new(SyncService::new(cache.clone(), Box::new(source), config.clone()));
//!
//! let scheduler = Scheduler::new(sync.clone(), config.sync_interval_hours);
//! scheduler.start().await;
//!
//! // Request handlers read through the sync service:
//! let snapshot = sync.get_or_sync().await;
//! # let _ = snapshot;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod source;
pub mod sync;

pub use cache::{BackendKind, CacheInfo, CacheStore};
pub use config::Config;
pub use source::{Credentials, HttpSource, Record, RemoteSource, SourceClient, SourceError};
pub use sync::{Scheduler, SchedulerStatus, SyncService, SyncSnapshot, SyncStatus};
