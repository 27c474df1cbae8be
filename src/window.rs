//! Time window of recent failures, used by the sliding-window strategy.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::time::{Duration, Instant};

/// Timestamps of the most recent failures inside a trailing time window.
///
/// At most `capacity` timestamps are retained; older ones can never change a
/// "at least `capacity` failures" decision.
pub(crate) struct FailureWindow {
    stamps: Mutex<SmallVec<[Instant; 16]>>,
    window_size: Duration,
    capacity: usize,
}

impl FailureWindow {
    pub(crate) fn new(window_size: Duration, capacity: usize) -> Self {
        Self {
            stamps: Mutex::new(SmallVec::new()),
            window_size,
            capacity: capacity.max(1),
        }
    }

    /// Records a failure at `now` and returns how many failures are in the window.
    pub(crate) fn record(&self, now: Instant) -> usize {
        let mut stamps = self.stamps.lock();
        self.evict(&mut stamps, now);

        stamps.push(now);
        if stamps.len() > self.capacity {
            let excess = stamps.len() - self.capacity;
            stamps.drain(..excess);
        }

        stamps.len()
    }

    /// Number of failures currently in the window.
    pub(crate) fn count(&self, now: Instant) -> usize {
        let mut stamps = self.stamps.lock();
        self.evict(&mut stamps, now);
        stamps.len()
    }

    fn evict(&self, stamps: &mut SmallVec<[Instant; 16]>, now: Instant) {
        // Near process start the cutoff may not be representable; nothing is old yet.
        let Some(cutoff) = now.checked_sub(self.window_size) else {
            return;
        };

        let stale = stamps.iter().take_while(|at| **at < cutoff).count();
        if stale > 0 {
            stamps.drain(..stale);
        }
    }
}
