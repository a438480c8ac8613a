//! Time source abstraction for deadlines and response timing.
//!
//! All timing in the engine goes through [`Clock`] so tests can substitute a
//! virtual clock and drive sessions deterministically. Production code uses
//! [`TokioClock`]; under a paused tokio runtime its sleeps auto-advance,
//! which covers most integration tests without touching [`VirtualClock`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Monotonic time and cancellable sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic seconds since the clock was created. Never decreases.
    fn now(&self) -> f64;

    /// Sleep for `duration`. Timer tasks sleep in short slices so shared
    /// cancellation flags are observed within one slice.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer wheel.
#[derive(Debug, Clone)]
pub struct TokioClock {
    epoch: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            epoch: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually advanced clock for tests. `sleep` parks until `advance` has moved
/// time past the wake target.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    inner: Arc<VirtualInner>,
}

#[derive(Debug, Default)]
struct VirtualInner {
    now: Mutex<f64>,
    advanced: Notify,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward and wake every parked sleeper.
    pub fn advance(&self, seconds: f64) {
        {
            let mut now = self.inner.now.lock();
            *now += seconds.max(0.0);
        }
        self.inner.advanced.notify_waiters();
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> f64 {
        *self.inner.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        let target = self.now() + duration.as_secs_f64();
        loop {
            // Register before re-checking so an advance between the check and
            // the await cannot be missed.
            let advanced = self.inner.advanced.notified();
            if self.now() >= target {
                return;
            }
            advanced.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_advances_with_runtime_time() {
        let clock = TokioClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_secs(3)).await;
        assert!(clock.now() - before >= 3.0);
    }

    #[tokio::test]
    async fn virtual_clock_sleep_wakes_on_advance() {
        let clock = VirtualClock::new();
        let sleeper = {
            let clock = clock.clone();
            tokio::spawn(async move {
                clock.sleep(Duration::from_secs(10)).await;
                clock.now()
            })
        };

        // Partial advance keeps the sleeper parked.
        clock.advance(4.0);
        tokio::task::yield_now().await;
        assert!(!sleeper.is_finished());

        clock.advance(6.0);
        let woke_at = sleeper.await.unwrap();
        assert!(woke_at >= 10.0);
    }

    #[tokio::test]
    async fn virtual_clock_zero_sleep_returns_immediately() {
        let clock = VirtualClock::new();
        clock.sleep(Duration::ZERO).await;
        assert_eq!(clock.now(), 0.0);
    }
}
