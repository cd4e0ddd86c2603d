//! Monotonic nanosecond clock, injected at `start` for testability.

use crate::domain::types::Nanos;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic nanosecond source.
///
/// Implementations must never go backwards within a single process
/// lifetime; `start`/`stop` and all duration math assume that.
pub trait Clock: Send + Sync {
    fn nanos(&self) -> Nanos;
}

/// Production clock backed by `std::time::Instant`.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn nanos(&self) -> Nanos {
        Nanos(self.epoch.elapsed().as_nanos() as u64)
    }
}

/// Deterministic clock for tests: starts at zero and only advances when
/// told to, so event timestamps in a test are exactly predictable.
#[derive(Default)]
pub struct FakeClock {
    now: AtomicU64,
}

impl FakeClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, nanos: u64) {
        self.now.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_nanos: u64) {
        self.now.fetch_add(delta_nanos, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn nanos(&self) -> Nanos {
        Nanos(self.now.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_is_deterministic() {
        let clock = FakeClock::new();
        assert_eq!(clock.nanos(), Nanos(0));
        clock.set(1_000_000);
        assert_eq!(clock.nanos(), Nanos(1_000_000));
        clock.advance(500_000);
        assert_eq!(clock.nanos(), Nanos(1_500_000));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.nanos();
        let b = clock.nanos();
        assert!(b >= a);
    }
}
