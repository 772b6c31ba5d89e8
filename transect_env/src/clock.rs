//! Core clock/scheduling abstraction for the transect runtime.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface between the core engines and the runtime they execute under.
///
/// This abstracts "the real world" so that `transect_core`'s recorder and
/// processor can run identically in production (backed by [`TokioClock`])
/// and under deterministic scenario replay (backed by `transect_sim`'s
/// seeded virtual clock).
///
/// # Determinism
///
/// Every source of non-determinism an engine might touch — wall time,
/// background-task scheduling — is routed through this trait so a
/// simulation clock can replay it bit-for-bit from a seed.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Returns the current monotonic time since the clock was created.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used for sample/item timestamps.
    fn system_time(&self) -> SystemTime;

    /// Suspends the caller for the given duration.
    ///
    /// Production: wraps `tokio::time::sleep`. Simulation: advances the
    /// virtual clock without actually blocking.
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task under this clock's runtime.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
