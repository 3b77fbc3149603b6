//! Injected wall clock.
//!
//! Everything timed in the receiver (supervision debounce, the rx watchdog,
//! the timeout sweeper) reads the clock through this trait so tests can drive
//! time by hand.

use chrono::Utc;

/// Source of wall-clock time with one-second resolution.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}
