//! The dashboard state holder.
//!
//! Owns the current snapshot and the subscriber list exclusively. Every
//! update replaces the snapshot wholesale (`Arc<DashboardSnapshot>`) and is
//! pushed to subscriber callbacks and to `watch` receivers.
//!
//! Cycle policy:
//! - one load in flight at a time; further triggers return `Skipped`
//! - after `destroy()` nothing is published, including the result of a
//!   cycle that was already running

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;

use super::aggregates::assemble_snapshot;
use super::fetch::fetch_dashboard_rows;
use super::poller::{start_poller, PollerHandle};
use super::types::{DashboardSnapshot, LoadOutcome, SubscriptionId};
use crate::backend::DashboardBackend;
use crate::config::DashboardSettings;

/// Subscriber callback, invoked with every published snapshot.
pub type SnapshotCallback = Arc<dyn Fn(Arc<DashboardSnapshot>) + Send + Sync>;

pub struct Aggregator<B: DashboardBackend> {
    backend: Arc<B>,
    settings: DashboardSettings,
    snapshot: watch::Sender<Arc<DashboardSnapshot>>,
    subscribers: Mutex<Vec<(SubscriptionId, SnapshotCallback)>>,
    next_subscription: AtomicU64,
    in_flight: AtomicBool,
    destroyed: AtomicBool,
    poller: Mutex<Option<PollerHandle>>,
}

/// Clears the in-flight flag when the cycle ends or its task is cancelled.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: DashboardBackend> Aggregator<B> {
    pub fn new(backend: B, settings: DashboardSettings) -> Arc<Self> {
        Self::with_shared_backend(Arc::new(backend), settings)
    }

    pub fn with_shared_backend(backend: Arc<B>, settings: DashboardSettings) -> Arc<Self> {
        let (snapshot, _) = watch::channel(Arc::new(DashboardSnapshot::default()));
        Arc::new(Self {
            backend,
            settings,
            snapshot,
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            in_flight: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            poller: Mutex::new(None),
        })
    }

    // ── Read side ───────────────────────────────────────────

    /// Latest published snapshot.
    pub fn current(&self) -> Arc<DashboardSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Receiver that observes every future snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Register a callback for every future snapshot. Ignored (but still
    /// assigned an id) once the aggregator is destroyed.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Arc<DashboardSnapshot>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        if !self.is_destroyed() {
            lock(&self.subscribers).push((id, Arc::new(callback)));
        }
        id
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.poller).is_some()
    }

    // ── Triggers ────────────────────────────────────────────

    /// Run one fetch-and-bucket cycle.
    ///
    /// Publishes the loading marker first, then either the fresh snapshot or
    /// the reset snapshot. Errors are logged, never returned.
    pub async fn load(&self) -> LoadOutcome {
        if self.is_destroyed() {
            return LoadOutcome::Destroyed;
        }
        let Some(_cycle) = CycleGuard::acquire(&self.in_flight) else {
            tracing::debug!("Dashboard load already in flight, trigger ignored");
            return LoadOutcome::Skipped;
        };

        self.publish(self.current().loading());

        let started = Instant::now();
        let result = fetch_dashboard_rows(self.backend.as_ref(), &self.settings).await;
        let finished_at = Utc::now();

        if self.is_destroyed() {
            tracing::debug!("Dashboard destroyed during load, result discarded");
            return LoadOutcome::Destroyed;
        }

        match result {
            Ok(rows) => {
                let snapshot = assemble_snapshot(rows, &self.settings.success_status, finished_at);
                tracing::debug!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    sample = snapshot.recent_appointments.len(),
                    total_patients = snapshot.total_patients,
                    "Dashboard snapshot assembled"
                );
                self.publish(snapshot);
                LoadOutcome::Loaded
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Dashboard load failed, publishing empty snapshot"
                );
                self.publish(DashboardSnapshot::failed(finished_at));
                LoadOutcome::Failed
            }
        }
    }

    /// Same cycle as `load`; the poller and manual pull-to-refresh use this.
    pub async fn refresh(&self) -> LoadOutcome {
        self.load().await
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Start periodic refresh at the configured interval and perform the
    /// initial load.
    pub async fn mount(self: &Arc<Self>) -> LoadOutcome {
        self.start_polling();
        self.load().await
    }

    /// Start the poller if it is not already running. Returns whether a new
    /// poller was started.
    pub fn start_polling(self: &Arc<Self>) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let mut poller = lock(&self.poller);
        if poller.is_some() {
            return false;
        }
        *poller = Some(start_poller(Arc::downgrade(self), self.settings.refresh_interval));
        true
    }

    /// Stop polling, drop subscribers, and suppress any further publish.
    /// Safe to call any number of times.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(mut poller) = lock(&self.poller).take() {
            poller.shutdown();
        }
        lock(&self.subscribers).clear();
        tracing::info!("Dashboard aggregator destroyed");
    }

    fn publish(&self, snapshot: DashboardSnapshot) {
        if self.is_destroyed() {
            return;
        }
        let snapshot = Arc::new(snapshot);
        self.snapshot.send_replace(Arc::clone(&snapshot));

        // Callbacks run outside the lock so they may (un)subscribe.
        let callbacks: Vec<SnapshotCallback> = lock(&self.subscribers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            // destroy() may have run on another thread, or inside an earlier callback.
            if self.is_destroyed() {
                return;
            }
            callback(Arc::clone(&snapshot));
        }
    }
}

impl<B: DashboardBackend> Drop for Aggregator<B> {
    fn drop(&mut self) {
        if let Some(mut poller) = lock(&self.poller).take() {
            poller.shutdown();
        }
    }
}
