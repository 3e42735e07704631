//! Monotonic time source for the scheduler.

use core::cell::Cell;
use core::time::Duration;

/// Monotonic clock. `now` is the time elapsed since an arbitrary fixed
/// origin and never goes backwards.
pub trait Clock {
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Clock advanced by hand. Drives tests and simulations where passes must
/// land on exact timestamps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub const fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
        }
    }

    /// Jump to `t`. Moving backwards is ignored.
    pub fn set(&self, t: Duration) {
        if t > self.now.get() {
            self.now.set(t);
        }
    }

    pub fn set_millis(&self, ms: u64) {
        self.set(Duration::from_millis(ms));
    }

    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get() + d);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new();
        clock.set_millis(40);
        clock.set_millis(10);
        assert_eq!(clock.now(), Duration::from_millis(40));

        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now(), Duration::from_millis(45));
    }
}
