//! Periodic refresh task.
//!
//! Spawns a tokio task that calls `refresh()` on a fixed interval. The task
//! holds only a weak reference, so it ends on its own once the aggregator is
//! dropped; `shutdown()` stops it immediately and cancels a running cycle.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::aggregator::Aggregator;
use super::types::LoadOutcome;
use crate::backend::DashboardBackend;

/// Handle for the refresh task. Dropping it shuts the task down.
pub struct PollerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the refresh loop. Must be called from within a tokio runtime.
pub fn start_poller<B: DashboardBackend>(
    aggregator: Weak<Aggregator<B>>,
    interval: Duration,
) -> PollerHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(poll_loop(aggregator, interval, shutdown_rx));

    tracing::info!(interval_ms = interval.as_millis() as u64, "Dashboard poller started");

    PollerHandle {
        shutdown_tx: Some(shutdown_tx),
        handle: Some(handle),
    }
}

async fn poll_loop<B: DashboardBackend>(
    aggregator: Weak<Aggregator<B>>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the mount performs the initial load.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tick.tick() => {
                let Some(aggregator) = aggregator.upgrade() else { break };
                match aggregator.refresh().await {
                    LoadOutcome::Destroyed => break,
                    LoadOutcome::Skipped => {
                        tracing::debug!("Poll tick skipped, previous cycle still running");
                    }
                    LoadOutcome::Loaded | LoadOutcome::Failed => {}
                }
            }
        }
    }
    tracing::info!("Dashboard poller shutting down");
}
