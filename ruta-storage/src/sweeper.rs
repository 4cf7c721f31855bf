//! Expiry Sweeper Background Task
//!
//! Reads already evict expired entries lazily; the sweeper bounds memory for
//! keys nobody reads again. Its interval is the shortest
//! `check_period_secs` among `checked-periodically` namespaces
//! (see [`CacheSettings::sweep_interval`](ruta_core::CacheSettings::sweep_interval)).

use crate::store::Store;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the sweeper's lifetime.
#[derive(Debug, Default)]
pub struct SweeperMetrics {
    /// Completed sweep cycles.
    pub sweeps: AtomicU64,
    /// Entries evicted across all cycles.
    pub evicted: AtomicU64,
}

impl SweeperMetrics {
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Periodically purge expired entries until the shutdown signal is received.
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(expiry_sweeper_task(store.clone(), period, shutdown_rx));
///
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn expiry_sweeper_task(
    store: Arc<Store>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweeperMetrics> {
    let metrics = Arc::new(SweeperMetrics::default());

    let mut sweep_interval = interval(period);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(period_secs = period.as_secs(), "Expiry sweeper started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Expiry sweeper shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep(&store, &metrics);
            }
        }
    }

    tracing::info!(
        sweeps = metrics.sweeps(),
        evicted = metrics.evicted(),
        "Expiry sweeper completed"
    );

    metrics
}

fn sweep(store: &Store, metrics: &SweeperMetrics) {
    metrics.sweeps.fetch_add(1, Ordering::Relaxed);
    let evicted = store.purge_expired();
    metrics.evicted.fetch_add(evicted as u64, Ordering::Relaxed);

    if evicted > 0 {
        tracing::info!(evicted, "Expiry sweep completed");
    } else {
        tracing::trace!("Expiry sweep completed with nothing to evict");
    }
}
