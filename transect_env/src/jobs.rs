//! Background job scheduling: the primary/secondary lane model of the
//! concurrency & resource model.
//!
//! The primary lane is serial and carries timeline-mutating work (merges,
//! healing, deletion). The secondary lane is for read-heavy side work
//! (reclassification, index backfill); it is suspended whenever the primary
//! lane is non-empty and demoted to serial execution while the app is
//! backgrounded, resuming only after the app has been foreground-or-inactive
//! for at least 60 seconds.

use crate::{Clock, EnvError};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Coarse application lifecycle state, observed by the scheduler only for
/// queue-concurrency decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

/// Which lane a job is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Timeline-mutating work: merges, healing, deletion. Serial, always runs.
    Primary,
    /// Read-heavy side work: reclassification, index backfill. Parallel,
    /// suspended under primary backlog or backgrounding.
    Secondary,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Drives the two background lanes described in the concurrency model.
///
/// Generic over [`Clock`] so the idle-resumption timer can be replayed
/// deterministically under simulation.
pub struct JobScheduler<C: Clock> {
    clock: Arc<C>,
    primary_tx: Sender<Job>,
    primary_rx: Receiver<Job>,
    secondary_tx: Sender<Job>,
    secondary_rx: Receiver<Job>,
    primary_in_flight: Arc<AtomicU64>,
    app_state: Arc<std::sync::Mutex<AppState>>,
    became_idle_eligible_at: Arc<AtomicU64>,
    secondary_paused: Arc<AtomicBool>,
}

const SECONDARY_RESUME_IDLE_SECS: u64 = 60;

impl<C: Clock> JobScheduler<C> {
    pub fn new(clock: Arc<C>) -> Self {
        let (primary_tx, primary_rx) = unbounded();
        let (secondary_tx, secondary_rx) = unbounded();
        Self {
            clock,
            primary_tx,
            primary_rx,
            secondary_tx,
            secondary_rx,
            primary_in_flight: Arc::new(AtomicU64::new(0)),
            app_state: Arc::new(std::sync::Mutex::new(AppState::Active)),
            became_idle_eligible_at: Arc::new(AtomicU64::new(0)),
            secondary_paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueues a job onto the requested lane.
    pub fn enqueue<F>(&self, kind: JobKind, job: F) -> Result<(), EnvError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = match kind {
            JobKind::Primary => &self.primary_tx,
            JobKind::Secondary => &self.secondary_tx,
        };
        sender
            .send(Box::new(job))
            .map_err(|_| EnvError::QueueClosed(format!("{kind:?}")))
    }

    /// Reports the current app lifecycle state; demotes/resumes the
    /// secondary lane accordingly.
    pub fn set_app_state(&self, state: AppState) {
        let mut guard = self.app_state.lock().expect("app_state mutex poisoned");
        let was_backgrounded = matches!(*guard, AppState::Background);
        *guard = state;
        if was_backgrounded && !matches!(state, AppState::Background) {
            self.became_idle_eligible_at
                .store(self.clock.now().as_secs(), Ordering::SeqCst);
        }
        if matches!(state, AppState::Background) {
            self.secondary_paused.store(true, Ordering::SeqCst);
        }
    }

    fn secondary_runnable(&self) -> bool {
        if self.primary_in_flight.load(Ordering::SeqCst) > 0 {
            return false;
        }
        let state = *self.app_state.lock().expect("app_state mutex poisoned");
        if matches!(state, AppState::Background) {
            return false;
        }
        if self.secondary_paused.load(Ordering::SeqCst) {
            let became_idle_at = self.became_idle_eligible_at.load(Ordering::SeqCst);
            let idle_for = self.clock.now().as_secs().saturating_sub(became_idle_at);
            if idle_for < SECONDARY_RESUME_IDLE_SECS {
                return false;
            }
            self.secondary_paused.store(false, Ordering::SeqCst);
        }
        true
    }

    /// Drains at most one primary job and, if the lane permits it, one
    /// secondary job. Intended to be called from the scheduler's own
    /// background task in a loop.
    pub fn drain_once(&self) {
        if let Ok(job) = self.primary_rx.try_recv() {
            self.primary_in_flight.fetch_add(1, Ordering::SeqCst);
            job();
            self.primary_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        if self.secondary_runnable() {
            if let Ok(job) = self.secondary_rx.try_recv() {
                job();
            }
        } else {
            debug!("secondary lane suspended");
        }
    }

    /// Spawns the scheduler's drain loop onto the clock's runtime.
    pub fn spawn_drain_loop(self: &Arc<Self>, poll_interval: Duration) {
        let this = Arc::clone(self);
        let clock = Arc::clone(&self.clock);
        clock.spawn("job-scheduler", async move {
            loop {
                this.drain_once();
                this.clock.sleep(poll_interval).await;
            }
        });
    }
}

impl<C: Clock> Drop for JobScheduler<C> {
    fn drop(&mut self) {
        if self.primary_in_flight.load(Ordering::SeqCst) > 0 {
            warn!("job scheduler dropped with primary jobs in flight");
        }
    }
}
