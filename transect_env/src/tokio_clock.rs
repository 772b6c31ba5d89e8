//! Production implementation of [`Clock`] using Tokio and the OS clock.

use crate::Clock;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::trace;

/// Production clock backed by Tokio and the system clock.
pub struct TokioClock {
    start: Instant,
}

impl TokioClock {
    /// Creates a new `TokioClock`.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an `Arc`-wrapped clock for sharing across the recorder and
    /// its background job queues.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.to_string();
        tokio::spawn(async move {
            trace!(task = %name, "spawned background task");
            future.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn advances_monotonically() {
        let clock = TokioClock::new();
        let t1 = clock.now();
        clock.sleep(Duration::from_millis(10)).await;
        let t2 = clock.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }
}
