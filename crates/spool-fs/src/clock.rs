//! Time source used for throttling and retry backoff.
//!
//! Everything that waits in spool goes through a [`Clock`], so tests can
//! swap in a [`ManualClock`] and assert on the exact sleep schedule instead
//! of burning wall-clock time.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration { (**self).now() }

    fn sleep(&self, duration: Duration) { (**self).sleep(duration) }
}

/// Wall clock backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self { Self::new() }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration { self.origin.elapsed() }

    fn sleep(&self, duration: Duration) { std::thread::sleep(duration) }
}

#[derive(Debug, Default)]
struct ManualState {
    now:    Duration,
    sleeps: Vec<Duration>,
}

/// Virtual clock. `sleep` returns immediately, advancing virtual time and
/// recording the requested duration.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self { Self::default() }

    /// Move virtual time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.now += duration;
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sleeps
            .clone()
    }

    pub fn total_slept(&self) -> Duration { self.sleeps().iter().sum() }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration { self.state.lock().unwrap_or_else(PoisonError::into_inner).now }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.now += duration;
        state.sleeps.push(duration);
    }
}
