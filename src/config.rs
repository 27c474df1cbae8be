//! Configuration for circuit breakers.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{CircuitBreaker, Fallback};
use crate::error::BreakerError;
use crate::hook::HookRegistry;
use crate::strategy::{FailureDetectionStrategy, ThresholdStrategy};

/// Default number of consecutive failures that trips the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default time the circuit stays open before a trial call is allowed.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Numeric settings of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the circuit under the default strategy.
    pub failure_threshold: u32,

    /// Minimum time the circuit stays open before a trial call.
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder<T, E> {
    name: Option<String>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    strategy: Option<Arc<dyn FailureDetectionStrategy<E>>>,
    fallback: Option<Fallback<T, E>>,
    hook_registry: Arc<HookRegistry>,
}

impl<T, E> Default for BreakerBuilder<T, E>
where
    T: 'static,
    E: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> BreakerBuilder<T, E>
where
    T: 'static,
    E: 'static,
{
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(BreakerConfig::default())
    }

    /// Creates a builder seeded with the given settings.
    pub fn from_config(config: BreakerConfig) -> Self {
        Self {
            name: None,
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: config.recovery_timeout,
            strategy: None,
            fallback: None,
            hook_registry: Arc::new(HookRegistry::new()),
        }
    }

    /// Sets a name used in diagnostics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the number of consecutive failures that trips the circuit.
    ///
    /// Only used by the default threshold strategy. Zero is treated as one.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how long the circuit stays open before a trial call is let through.
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets a custom failure detection strategy, replacing the threshold strategy.
    pub fn failure_detection_strategy<S>(mut self, strategy: S) -> Self
    where
        S: FailureDetectionStrategy<E>,
    {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Uses a closure `(failure_count, last_error) -> bool` as the failure detection strategy.
    pub fn failure_detection_fn<F>(self, f: F) -> Self
    where
        F: Fn(u32, Option<&E>) -> bool + Send + Sync + 'static,
    {
        self.failure_detection_strategy(crate::strategy::from_fn(f))
    }

    /// Sets a fallback invoked with the causing error when a call fails or is rejected.
    ///
    /// The fallback's result becomes the outcome of the call. If it fails, the
    /// call fails with [`BreakerError::Fallback`].
    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(BreakerError<E>) -> Result<T, E> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Sets a fallback that always yields a clone of `value`.
    pub fn fallback_value(self, value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        self.fallback(move |_| Ok(value.clone()))
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Shares an existing hook registry, e.g. across all breakers of a registry.
    pub fn shared_hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hook_registry = hooks;
        self
    }

    /// Builds a new circuit breaker with the configured settings.
    pub fn build(self) -> CircuitBreaker<T, E> {
        let failure_threshold = self.failure_threshold;
        let strategy: Arc<dyn FailureDetectionStrategy<E>> = match self.strategy {
            Some(strategy) => strategy,
            None => Arc::new(ThresholdStrategy::new(failure_threshold)),
        };

        CircuitBreaker::new(
            self.name,
            failure_threshold,
            self.recovery_timeout,
            strategy,
            self.fallback,
            self.hook_registry,
        )
    }
}
