//! Failure detection strategies deciding when a circuit trips.

use crate::window::FailureWindow;
use std::fmt;
use std::time::{Duration, Instant};

/// Decides whether a breaker should trip after a failure.
///
/// The breaker owns the failure counter and calls the strategy once per
/// recorded failure, under its lock. `last_error` is `None` when the failure
/// carries no error value, for example when the operation panicked.
pub trait FailureDetectionStrategy<E>: Send + Sync + 'static {
    /// Returns true if the circuit should open.
    fn should_trip(&self, failure_count: u32, last_error: Option<&E>) -> bool;
}

/// Trips once the consecutive failure count reaches a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdStrategy {
    threshold: u32,
}

impl ThresholdStrategy {
    /// Creates a threshold strategy. A threshold of zero is treated as one.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    /// Gets the configured threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl<E> FailureDetectionStrategy<E> for ThresholdStrategy {
    fn should_trip(&self, failure_count: u32, _last_error: Option<&E>) -> bool {
        failure_count >= self.threshold
    }
}

/// A strategy backed by a plain function. See [`from_fn`].
#[derive(Clone, Copy)]
pub struct FnStrategy<F> {
    f: F,
}

impl<F> fmt::Debug for FnStrategy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStrategy").finish_non_exhaustive()
    }
}

impl<E, F> FailureDetectionStrategy<E> for FnStrategy<F>
where
    F: Fn(u32, Option<&E>) -> bool + Send + Sync + 'static,
{
    fn should_trip(&self, failure_count: u32, last_error: Option<&E>) -> bool {
        (self.f)(failure_count, last_error)
    }
}

/// Wraps a closure as a strategy.
///
/// ```rust
/// use keyed_breaker::strategy::{self, FailureDetectionStrategy};
///
/// // Trip immediately on timeouts, otherwise after five failures.
/// let strategy = strategy::from_fn(|count, err: Option<&String>| {
///     count >= 5 || err.map_or(false, |e| e.contains("timeout"))
/// });
/// assert!(strategy.should_trip(1, Some(&"read timeout".to_string())));
/// assert!(!strategy.should_trip(1, None::<&String>));
/// ```
pub fn from_fn<E, F>(f: F) -> FnStrategy<F>
where
    F: Fn(u32, Option<&E>) -> bool + Send + Sync + 'static,
{
    FnStrategy { f }
}

/// Trips when `max_failures` failures happen within a trailing time window,
/// regardless of successes in between.
pub struct SlidingWindowStrategy {
    window: FailureWindow,
    max_failures: u32,
}

impl SlidingWindowStrategy {
    /// Creates a sliding-window strategy. A `max_failures` of zero is treated as one.
    pub fn new(max_failures: u32, window: Duration) -> Self {
        let max_failures = max_failures.max(1);
        Self {
            window: FailureWindow::new(window, max_failures as usize),
            max_failures,
        }
    }

    /// Number of failures currently inside the window.
    pub fn failures_in_window(&self) -> usize {
        self.window.count(Instant::now())
    }
}

impl fmt::Debug for SlidingWindowStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowStrategy")
            .field("max_failures", &self.max_failures)
            .field("failures_in_window", &self.failures_in_window())
            .finish()
    }
}

impl<E> FailureDetectionStrategy<E> for SlidingWindowStrategy {
    fn should_trip(&self, _failure_count: u32, _last_error: Option<&E>) -> bool {
        self.window.record(Instant::now()) >= self.max_failures as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_trips_at_count() {
        let strategy = ThresholdStrategy::new(3);
        assert!(!FailureDetectionStrategy::<()>::should_trip(&strategy, 2, None));
        assert!(FailureDetectionStrategy::<()>::should_trip(&strategy, 3, Some(&())));
        assert!(FailureDetectionStrategy::<()>::should_trip(&strategy, 4, None));
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let strategy = ThresholdStrategy::new(0);
        assert_eq!(strategy.threshold(), 1);
        assert!(!FailureDetectionStrategy::<()>::should_trip(&strategy, 0, None));
    }

    #[derive(Debug, PartialEq)]
    enum Kind {
        Fatal,
        Transient,
    }

    #[test]
    fn fn_strategy_sees_error() {
        let strategy = from_fn(|_, err: Option<&Kind>| err == Some(&Kind::Fatal));
        assert!(strategy.should_trip(1, Some(&Kind::Fatal)));
        assert!(!strategy.should_trip(10, Some(&Kind::Transient)));
        assert!(!strategy.should_trip(10, None::<&Kind>));
    }

    #[test]
    fn sliding_window_counts_recorded_failures() {
        let strategy = SlidingWindowStrategy::new(3, Duration::from_secs(60));
        assert!(!FailureDetectionStrategy::<()>::should_trip(&strategy, 1, None));
        assert!(!FailureDetectionStrategy::<()>::should_trip(&strategy, 1, None));
        assert!(FailureDetectionStrategy::<()>::should_trip(&strategy, 1, None));
        assert_eq!(strategy.failures_in_window(), 3);
    }

    #[test]
    fn sliding_window_forgets_old_failures() {
        let strategy = SlidingWindowStrategy::new(2, Duration::from_millis(20));
        assert!(!FailureDetectionStrategy::<()>::should_trip(&strategy, 1, None));
        std::thread::sleep(Duration::from_millis(40));
        assert!(!FailureDetectionStrategy::<()>::should_trip(&strategy, 2, None));
    }
}
