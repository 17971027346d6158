//! Nullable clock: deterministic time for testing.

use rebase_types::{Clock, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to, and never moves backward.
#[derive(Debug, Default)]
pub struct NullClock {
    current: AtomicU64,
}

impl NullClock {
    pub fn new(initial_secs: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_secs),
        }
    }

    /// Advance time by a number of seconds, saturating at `u64::MAX`.
    pub fn advance(&self, secs: u64) -> Timestamp {
        let previous = self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(secs))
            })
            .unwrap_or_else(|t| t);
        Timestamp::new(previous.saturating_add(secs))
    }

    /// Move to `secs` if it lies in the future; earlier values are ignored.
    pub fn set(&self, secs: u64) -> Timestamp {
        let previous = self.current.fetch_max(secs, Ordering::SeqCst);
        Timestamp::new(previous.max(secs))
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_only_when_told() {
        let clock = NullClock::new(100);
        assert_eq!(clock.now(), Timestamp::new(100));
        assert_eq!(clock.advance(3_600), Timestamp::new(3_700));
        assert_eq!(clock.now(), Timestamp::new(3_700));
    }

    #[test]
    fn set_never_moves_backward() {
        let clock = NullClock::new(500);
        assert_eq!(clock.set(200), Timestamp::new(500));
        assert_eq!(clock.set(900), Timestamp::new(900));
        assert_eq!(clock.now(), Timestamp::new(900));
    }

    #[test]
    fn advance_saturates() {
        let clock = NullClock::new(u64::MAX - 1);
        clock.advance(10);
        assert_eq!(clock.now(), Timestamp::new(u64::MAX));
    }
}
