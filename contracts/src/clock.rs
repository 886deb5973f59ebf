//! Time sources for the withdrawal bucket.
//!
//! Bucket accrual is measured in whole seconds since the Unix epoch. The
//! bucket never reads the system time directly; it asks a [`Clock`], so
//! tests can drive accrual deterministically with a [`ManualClock`].

use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> u64;
}

/// Wall-clock time via `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        // Pre-epoch clocks clamp to zero.
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A settable clock. Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Moves time forward by `secs`, saturating at `u64::MAX`.
    pub fn advance(&self, secs: u64) {
        let current = self.now.load(Ordering::SeqCst);
        self.now.store(current.saturating_add(secs), Ordering::SeqCst);
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Shared, type-erased clock handle held by a bucket.
pub type SharedClock = Arc<dyn Clock>;

/// The clock a bucket gets when none is supplied, e.g. after loading a
/// snapshot.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let other = clock.clone();
        clock.advance(25);
        assert_eq!(other.now(), 125);
        other.set(u64::MAX);
        clock.advance(1);
        assert_eq!(clock.now(), u64::MAX);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
