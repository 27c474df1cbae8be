//! Core circuit breaker implementation.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{BreakerError, BreakerResult};
use crate::hook::HookRegistry;
use crate::state::{Admission, Counters, Snapshot, State, StateMirror, Transition};
use crate::strategy::FailureDetectionStrategy;

pub(crate) type Fallback<T, E> = Arc<dyn Fn(BreakerError<E>) -> Result<T, E> + Send + Sync>;

/// Inner state of the circuit breaker, shared between handles.
struct BreakerInner<T, E> {
    name: Option<String>,
    counters: Mutex<Counters>,
    mirror: StateMirror,
    failure_threshold: u32,
    recovery_timeout: Duration,
    strategy: Arc<dyn FailureDetectionStrategy<E>>,
    fallback: Option<Fallback<T, E>>,
    hooks: Arc<HookRegistry>,
}

/// A circuit breaker that can wrap function calls to prevent cascading failures.
///
/// Cloning is cheap and yields a handle to the same breaker.
pub struct CircuitBreaker<T, E> {
    inner: Arc<BreakerInner<T, E>>,
}

impl<T, E> CircuitBreaker<T, E>
where
    T: 'static,
    E: 'static,
{
    pub(crate) fn new(
        name: Option<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        strategy: Arc<dyn FailureDetectionStrategy<E>>,
        fallback: Option<Fallback<T, E>>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let inner = BreakerInner {
            name,
            counters: Mutex::new(Counters::new()),
            mirror: StateMirror::new(),
            failure_threshold,
            recovery_timeout,
            strategy,
            fallback,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> crate::config::BreakerBuilder<T, E> {
        crate::config::BreakerBuilder::new()
    }
}

impl<T, E: 'static> CircuitBreaker<T, E> {
    /// Gets the current state of the circuit breaker.
    pub fn state(&self) -> State {
        self.inner.mirror.current()
    }

    /// Gets the number of consecutive failures since the last reset.
    pub fn failure_count(&self) -> u32 {
        self.inner.counters.lock().failure_count
    }

    /// Gets the time of the most recent failure, if any.
    pub fn last_failure_time(&self) -> Option<Instant> {
        self.inner.counters.lock().last_failure_time
    }

    /// Reads state, failure count and last failure time in one consistent step.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.counters.lock().snapshot()
    }

    /// Gets the breaker's name, if one was configured.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Gets the configured failure threshold.
    pub fn failure_threshold(&self) -> u32 {
        self.inner.failure_threshold
    }

    /// Gets the configured recovery timeout.
    pub fn recovery_timeout(&self) -> Duration {
        self.inner.recovery_timeout
    }

    /// Gets the hook registry, which can be updated at any time.
    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Creates a [`WeakCircuitBreaker`] that does not keep this breaker alive.
    pub fn downgrade(&self) -> WeakCircuitBreaker<T, E> {
        WeakCircuitBreaker {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles refer to the same breaker.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Executes a function wrapped by the circuit breaker.
    ///
    /// Without a fallback, a failing operation yields [`BreakerError::Operation`]
    /// and a rejected call yields [`BreakerError::Open`]. With a fallback, both
    /// are handed to the fallback and its result is returned instead.
    pub fn execute<F>(&self, operation: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let Some(admission) = self.admit() else {
            return self.reject();
        };

        let guard = CallGuard::new(self, admission);
        let result = operation();
        guard.disarm();

        self.complete(admission, result)
    }

    /// Executes a computation that cannot fail on its own.
    ///
    /// The call can still be rejected while the circuit is open.
    pub fn execute_infallible<F>(&self, operation: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> T,
    {
        self.execute(|| Ok(operation()))
    }

    /// Wraps an operation so that every invocation runs through this breaker.
    pub fn decorate<F>(&self, operation: F) -> impl Fn() -> BreakerResult<T, E>
    where
        F: Fn() -> Result<T, E>,
    {
        let breaker = self.clone();
        move || breaker.execute(&operation)
    }

    /// Forces the circuit breaker to the open state.
    ///
    /// The recovery timeout starts from now. Returns true if the state changed.
    pub fn force_open(&self) -> bool {
        self.update(|counters| {
            if counters.state == State::Open {
                return (false, None);
            }
            counters.last_failure_time = Some(Instant::now());
            let transition = counters.move_to(State::Open);
            (transition.is_some(), transition)
        })
    }

    /// Resets the breaker to the closed state and clears the failure count.
    ///
    /// Returns true if the state changed.
    pub fn reset(&self) -> bool {
        self.update(|counters| {
            counters.failure_count = 0;
            let transition = counters.move_to(State::Closed);
            (transition.is_some(), transition)
        })
    }

    /// Decides whether a call may run. `None` means it is short-circuited.
    fn admit(&self) -> Option<Admission> {
        if self.inner.mirror.current() == State::Closed {
            return Some(Admission::Normal);
        }

        let recovery_timeout = self.inner.recovery_timeout;
        self.update(|counters| match counters.state {
            State::Closed => (Some(Admission::Normal), None),
            // A trial is already in flight.
            State::HalfOpen => (None, None),
            State::Open => {
                if counters.recovery_elapsed(Instant::now(), recovery_timeout) {
                    (Some(Admission::Trial), counters.move_to(State::HalfOpen))
                } else {
                    (None, None)
                }
            }
        })
    }

    fn complete(&self, admission: Admission, result: Result<T, E>) -> BreakerResult<T, E> {
        match result {
            Ok(value) => {
                self.on_success(admission);
                Ok(value)
            }
            Err(err) => {
                self.on_failure(Some(&err));
                self.recover(BreakerError::Operation(err))
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        self.update(|counters| match (counters.state, admission) {
            (State::Closed, _) => {
                counters.failure_count = 0;
                ((), None)
            }
            (State::HalfOpen, Admission::Trial) => {
                counters.failure_count = 0;
                ((), counters.move_to(State::Closed))
            }
            // Result of a call admitted before the circuit moved on.
            _ => ((), None),
        });
        self.inner.hooks.execute_success_hook();
    }

    fn on_failure(&self, err: Option<&E>) {
        let strategy = &self.inner.strategy;
        self.update(|counters| {
            counters.failure_count = counters.failure_count.saturating_add(1);
            counters.last_failure_time = Some(Instant::now());
            let trip = strategy.should_trip(counters.failure_count, err);

            let transition = match counters.state {
                State::Closed if trip => counters.move_to(State::Open),
                // A failed trial always re-opens, whatever the strategy says.
                State::HalfOpen => counters.move_to(State::Open),
                _ => None,
            };
            ((), transition)
        });
        self.inner.hooks.execute_failure_hook();
    }

    fn reject(&self) -> BreakerResult<T, E> {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            breaker = self.inner.name.as_deref().unwrap_or("unnamed"),
            "call short-circuited"
        );

        self.inner.hooks.execute_rejected_hook();
        self.recover(BreakerError::Open)
    }

    fn recover(&self, err: BreakerError<E>) -> BreakerResult<T, E> {
        match &self.inner.fallback {
            Some(fallback) => fallback(err).map_err(BreakerError::Fallback),
            None => Err(err),
        }
    }

    /// Runs `f` under the breaker lock, then reports any transition once the lock is released.
    fn update<R>(&self, f: impl FnOnce(&mut Counters) -> (R, Option<Transition>)) -> R {
        let (outcome, transition) = {
            let mut counters = self.inner.counters.lock();
            let (outcome, transition) = f(&mut counters);
            if let Some(transition) = transition {
                self.inner.mirror.publish(transition.to);
            }
            (outcome, transition)
        };

        if let Some(transition) = transition {
            self.report(transition);
        }

        outcome
    }

    fn report(&self, transition: Transition) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            breaker = self.inner.name.as_deref().unwrap_or("unnamed"),
            from = %transition.from,
            to = %transition.to,
            "circuit breaker state transition"
        );

        self.inner
            .hooks
            .execute_state_transition_hook(transition.from, transition.to);
    }
}

/// Settles an admitted call that never reported an outcome.
///
/// A panicking operation counts as a failure with no error value. A trial that
/// is abandoned for any reason, including a dropped future, re-opens the
/// circuit so the breaker cannot stay half-open forever.
struct CallGuard<'a, T, E: 'static> {
    breaker: &'a CircuitBreaker<T, E>,
    admission: Admission,
    armed: bool,
}

impl<'a, T, E: 'static> CallGuard<'a, T, E> {
    fn new(breaker: &'a CircuitBreaker<T, E>, admission: Admission) -> Self {
        Self {
            breaker,
            admission,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T, E: 'static> Drop for CallGuard<'_, T, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if std::thread::panicking() || self.admission == Admission::Trial {
            self.breaker.on_failure(None);
        }
    }
}

/// A non-owning handle to a [`CircuitBreaker`].
///
/// Hooks that need to read their own breaker should capture one of these.
/// A hook holding a full clone keeps the breaker alive forever, since the
/// breaker owns its hooks.
pub struct WeakCircuitBreaker<T, E> {
    inner: Weak<BreakerInner<T, E>>,
}

impl<T, E> WeakCircuitBreaker<T, E> {
    /// Returns the breaker if it is still alive.
    pub fn upgrade(&self) -> Option<CircuitBreaker<T, E>> {
        self.inner.upgrade().map(|inner| CircuitBreaker { inner })
    }
}

impl<T, E> Clone for WeakCircuitBreaker<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for WeakCircuitBreaker<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCircuitBreaker")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// Allow cloning of circuit breakers - cheap because inner state is Arc'd
impl<T, E> Clone for CircuitBreaker<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E: 'static> fmt::Debug for CircuitBreaker<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &snapshot.state)
            .field("failure_count", &snapshot.failure_count)
            .field("failure_threshold", &self.inner.failure_threshold)
            .field("recovery_timeout", &self.inner.recovery_timeout)
            .field("has_fallback", &self.inner.fallback.is_some())
            .finish()
    }
}

// Implement Async support when the feature is enabled
#[cfg(feature = "async")]
impl<T, E: 'static> CircuitBreaker<T, E> {
    /// Executes an async function wrapped by the circuit breaker.
    ///
    /// Dropping the returned future while it runs a trial call re-opens the circuit.
    pub async fn execute_async<F, Fut>(&self, operation: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let Some(admission) = self.admit() else {
            return self.reject();
        };

        let guard = CallGuard::new(self, admission);
        let result = operation().await;
        guard.disarm();

        self.complete(admission, result)
    }

    /// Wraps an async operation so that every invocation runs through this breaker.
    pub fn decorate_async<F, Fut>(
        &self,
        operation: F,
    ) -> impl Fn() -> futures::future::BoxFuture<'static, BreakerResult<T, E>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        use futures::FutureExt;

        let breaker = self.clone();
        let operation = Arc::new(operation);
        move || {
            let breaker = breaker.clone();
            let operation = Arc::clone(&operation);
            async move { breaker.execute_async(|| operation()).await }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker<&'static str, &'static str> {
        CircuitBreaker::builder()
            .failure_threshold(threshold)
            .recovery_timeout(timeout)
            .build()
    }

    #[test]
    fn closed_success_clears_failures() {
        let breaker = breaker(3, Duration::from_secs(1));
        let _ = breaker.execute(|| Err("down"));
        let _ = breaker.execute(|| Err("down"));
        assert_eq!(breaker.failure_count(), 2);

        assert_eq!(breaker.execute(|| Ok("up")), Ok("up"));
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn mirror_follows_guarded_state() {
        let breaker = breaker(1, Duration::from_secs(60));
        let _ = breaker.execute(|| Err("down"));
        assert_eq!(breaker.state(), State::Open);
        assert_eq!(breaker.snapshot().state, State::Open);
        assert!(breaker.snapshot().last_failure_time.is_some());
    }

    #[test]
    fn trial_is_exclusive() {
        let breaker = breaker(1, Duration::ZERO);
        let _ = breaker.execute(|| Err("down"));

        let inner_result = breaker.execute(|| {
            assert_eq!(breaker.state(), State::HalfOpen);
            // A second caller during the trial is short-circuited.
            assert_eq!(breaker.execute(|| Ok("sneaky")), Err(BreakerError::Open));
            Ok("trial")
        });

        assert_eq!(inner_result, Ok("trial"));
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn panicking_trial_reopens() {
        let breaker = breaker(1, Duration::ZERO);
        let _ = breaker.execute(|| Err("down"));
        let before = breaker.failure_count();

        let trial = breaker.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = trial.execute(|| -> Result<&'static str, &'static str> { panic!("boom") });
        }));

        assert!(outcome.is_err());
        assert_eq!(breaker.state(), State::Open);
        assert_eq!(breaker.failure_count(), before + 1);
    }

    #[test]
    fn strategy_sees_no_error_for_panics() {
        let seen_none = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen_none);
        let breaker: CircuitBreaker<(), &'static str> = CircuitBreaker::builder()
            .failure_detection_fn(move |_, err| {
                if err.is_none() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                false
            })
            .build();

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = breaker.execute(|| -> Result<(), &'static str> { panic!("boom") });
        }));

        assert_eq!(seen_none.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn weak_handle_follows_breaker_lifetime() {
        let breaker = breaker(1, Duration::from_secs(60));
        let weak = breaker.downgrade();

        let upgraded = weak.upgrade().expect("breaker alive");
        assert!(CircuitBreaker::ptr_eq(&breaker, &upgraded));

        drop(upgraded);
        drop(breaker);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn force_open_and_reset() {
        let breaker = breaker(3, Duration::from_secs(60));
        assert!(breaker.force_open());
        assert!(!breaker.force_open());
        assert_eq!(breaker.execute(|| Ok("up")), Err(BreakerError::Open));

        assert!(breaker.reset());
        assert!(!breaker.reset());
        assert_eq!(breaker.execute(|| Ok("up")), Ok("up"));
    }
}
