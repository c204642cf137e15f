//! Snapshot synchronization and its background scheduler.
//!
//! [`SyncService`] performs the authenticated bulk fetch and cache
//! population; [`Scheduler`] drives it on a drift-corrected interval so
//! request-serving code never has to block on the remote source.

pub mod scheduler;
pub mod service;

#[cfg(test)]
pub mod testing;

pub use scheduler::{Scheduler, SchedulerStatus};
pub use service::{SyncService, SyncSnapshot, SyncStatus, SNAPSHOT_CACHE_KEY};
