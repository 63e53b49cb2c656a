//! Periodic sweep that marks tasks overdue once their due time passes.

use crate::notify::TaskEvent;
use crate::store::Store;
use eyre::Result;
use std::time::Duration;

/// Default seconds between sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Run one sweep: transition everything past due to `overdue`, emit an
/// event per affected task, and report how many were marked.
pub fn sweep_once(store: &Store) -> Result<usize> {
    let now = store.now();
    let marked = store.mark_overdue(now)?;

    for task in &marked {
        store.emit(TaskEvent::Overdue { task: task.clone() });
    }

    if marked.is_empty() {
        log::debug!("Sweep found nothing past due");
    } else {
        log::info!("Sweep marked {} task(s) overdue", marked.len());
    }

    Ok(marked.len())
}

/// Periodic sweeper. Owns its own store handle so it can run on a
/// separate task next to a serving loop.
pub struct Sweeper {
    store: Store,
    interval: Duration,
}

impl Sweeper {
    pub fn new(store: Store, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Sweep on a fixed cadence until dropped or aborted. The first sweep
    /// runs one full interval after startup. A failed sweep is logged and
    /// the loop moves on to the next tick.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // interval fires its first tick immediately; consume it so the
        // sweep cadence starts one interval from now
        ticker.tick().await;

        log::info!("Sweeper running every {}s", self.interval.as_secs());
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_once(&self.store) {
                log::error!("Sweep failed: {}", e);
            }
        }
    }
}
