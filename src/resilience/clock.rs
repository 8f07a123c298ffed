//! Time abstraction for the resilience layer.
//!
//! Backoff delays and rate-limit windows are driven through a `Clock` trait
//! so tests can run deterministically without wall-clock sleeps.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Real system clock using `std::time::Instant::now()` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests.
///
/// `sleep` advances the virtual time immediately instead of blocking, and
/// every requested sleep is recorded so tests can assert backoff schedules.
pub struct MockClock {
    now: Mutex<Instant>,
    slept: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            slept: Mutex::new(Vec::new()),
        }
    }

    /// Advances the virtual time.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += duration;
    }

    /// Returns every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.slept
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - start, Duration::from_secs(5));
    }

    #[test]
    fn test_mock_clock_sleep_advances_and_records() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(4));
        clock.sleep(Duration::from_secs(8));
        assert_eq!(clock.now() - start, Duration::from_secs(12));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(4), Duration::from_secs(8)]
        );
    }
}
