//! Background scheduler that keeps the snapshot warm.
//!
//! One tokio task syncs once at startup, then once every interval. The next
//! due time is computed from when a sync attempt *finished*, never from the
//! previous due time, so a slow or delayed run shifts the schedule instead
//! of triggering a cascade of catch-up runs. A failed sync is scheduled
//! exactly like a successful one; the interval is a freshness cadence, not
//! a retry policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::service::SyncService;

/// How often the loop wakes to check whether a sync is due
const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// Bound on how long `stop` waits for the task to wind down
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub sync_interval_hours: f64,
    pub next_sync: Option<DateTime<Utc>>,
    pub minutes_until_next_sync: Option<i64>,
}

/// State shared between the loop task and status queries.
struct Shared {
    running: AtomicBool,
    next_due: std::sync::Mutex<Option<DateTime<Utc>>>,
}

pub struct Scheduler {
    service: Arc<SyncService>,
    interval: Duration,
    tick: Duration,
    stop_timeout: Duration,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(service: Arc<SyncService>, interval_hours: u64) -> Self {
        Self::with_intervals(
            service,
            Duration::from_secs(interval_hours * 3600),
            DEFAULT_TICK,
        )
    }

    /// Explicit interval and tick, mainly so tests can run at millisecond
    /// scale.
    pub fn with_intervals(service: Arc<SyncService>, interval: Duration, tick: Duration) -> Self {
        Self::with_timing(service, interval, tick, STOP_TIMEOUT)
    }

    fn with_timing(
        service: Arc<SyncService>,
        interval: Duration,
        tick: Duration,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            service,
            interval,
            tick,
            stop_timeout,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                next_due: std::sync::Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start the background loop. Idempotent: starting an already-running
    /// scheduler is a logged no-op, never a second worker.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            warn!("Scheduler already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.shared.running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(run_loop(
            self.service.clone(),
            self.shared.clone(),
            self.interval,
            self.tick,
            stop_rx,
        ));

        *worker = Some(Worker { handle, stop_tx });
        info!(
            "Scheduler started (sync every {:.1} hours)",
            self.interval.as_secs_f64() / 3600.0
        );
    }

    /// Signal the loop to exit and wait (bounded) for it to finish.
    /// Idempotent if already stopped.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        let Some(Worker { handle, stop_tx }) = worker.take() else {
            info!("Scheduler not running");
            return;
        };

        let _ = stop_tx.send(true);
        let abort = handle.abort_handle();
        if tokio::time::timeout(self.stop_timeout, handle).await.is_err() {
            // A task stuck mid-sync must not outlive the stop, or a later
            // start would run two workers against the same cache.
            warn!(
                "Scheduler task did not stop within {:?}, aborting it",
                self.stop_timeout
            );
            abort.abort();
        }

        self.shared.running.store(false, Ordering::SeqCst);
        *self.shared.next_due.lock().expect("next_due lock poisoned") = None;
        info!("Scheduler stopped");
    }

    pub fn get_status(&self) -> SchedulerStatus {
        let running = self.shared.running.load(Ordering::SeqCst);
        let next_due = *self.shared.next_due.lock().expect("next_due lock poisoned");

        SchedulerStatus {
            running,
            sync_interval_hours: self.interval.as_secs_f64() / 3600.0,
            next_sync: next_due,
            minutes_until_next_sync: next_due
                .map(|due| (due - Utc::now()).num_seconds().max(0) / 60),
        }
    }
}

async fn run_loop(
    service: Arc<SyncService>,
    shared: Arc<Shared>,
    interval: Duration,
    tick: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    info!("Scheduler task started, performing initial sync");
    service.sync_to_cache().await;

    let interval = chrono::Duration::seconds(interval.as_secs().max(1) as i64);
    let mut next_due = Utc::now() + interval;
    set_next_due(&shared, next_due);

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(tick) => {
                if Utc::now() >= next_due {
                    info!("Scheduled sync triggered");
                    service.sync_to_cache().await;
                    // Drift correction: schedule relative to completion,
                    // success and failure alike.
                    next_due = Utc::now() + interval;
                    set_next_due(&shared, next_due);
                }
            }
        }
    }

    info!("Scheduler task exiting");
}

fn set_next_due(shared: &Shared, due: DateTime<Utc>) {
    *shared.next_due.lock().expect("next_due lock poisoned") = Some(due);
    info!("Next sync scheduled for: {}", due.to_rfc3339());
}
