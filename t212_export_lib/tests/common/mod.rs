//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::{Duration, Instant};

use t212_export_lib::Clock;

/// Virtual clock that returns from `sleep` immediately.
///
/// Each sleep advances the clock by the requested duration and is recorded,
/// so callers can assert on the exact sequence of waits.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Every duration passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Total virtual time elapsed.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Moves the clock forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        self.advance(duration);
    }
}

#[tokio::test]
async fn manual_clock_records_and_advances() {
    let clock = ManualClock::new();
    let start = clock.now();

    clock.sleep(Duration::from_secs(30)).await;
    clock.sleep(Duration::from_secs(10)).await;
    clock.advance(Duration::from_secs(5));

    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(30), Duration::from_secs(10)]
    );
    assert_eq!(clock.elapsed(), Duration::from_secs(45));
    assert_eq!(clock.now() - start, Duration::from_secs(45));
}
