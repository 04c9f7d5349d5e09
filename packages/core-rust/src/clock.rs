//! Pluggable wall-clock source.
//!
//! The sync core timestamps everything (`createdAt`, `nextAttemptAt`, `occurredAt`, ...) in
//! plain epoch milliseconds. Every component that needs "now" takes a `&dyn ClockSource`
//! rather than calling `SystemTime::now()` directly, so backoff and freshness logic can be
//! driven deterministically in tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time, in milliseconds since the Unix epoch.
pub trait ClockSource: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_millis(&self) -> i64;
}

/// Real wall-clock, backed by `SystemTime::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_millis(&self) -> i64 {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

/// A clock that returns a fixed, externally-advanceable value.
///
/// Used in tests to drive backoff and freshness windows without sleeping.
#[derive(Debug, Clone)]
pub struct FixedClock {
    millis: Arc<AtomicI64>,
}

impl FixedClock {
    /// Creates a clock starting at the given epoch-millis value.
    #[must_use]
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    /// Advances the clock by `delta_millis` (may be negative) and returns the new value.
    pub fn advance(&self, delta_millis: i64) -> i64 {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst) + delta_millis
    }

    /// Sets the clock to an absolute epoch-millis value.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl ClockSource for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_plausible_epoch_millis() {
        let now = SystemClock.now_millis();
        // 2020-01-01T00:00:00Z in epoch millis, a loose sanity floor.
        assert!(now > 1_577_836_800_000);
    }

    #[test]
    fn fixed_clock_starts_at_given_value() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
    }

    #[test]
    fn fixed_clock_advance_returns_new_value() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.advance(500), 1_500);
        assert_eq!(clock.now_millis(), 1_500);
    }

    #[test]
    fn fixed_clock_advance_can_go_backward() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.advance(-200), 800);
    }

    #[test]
    fn fixed_clock_set_overrides_absolute_value() {
        let clock = FixedClock::new(1_000);
        clock.set(5_000);
        assert_eq!(clock.now_millis(), 5_000);
    }

    #[test]
    fn fixed_clock_clones_share_state() {
        let clock = FixedClock::new(0);
        let handle = clock.clone();
        handle.advance(42);
        assert_eq!(clock.now_millis(), 42);
    }
}
