//! Registry handing out one shared circuit breaker per endpoint key.

use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::num::NonZeroUsize;

use ahash::RandomState;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::breaker::CircuitBreaker;

/// Shard count used by [`CircuitBreakerRegistry::new`], sized from the host's parallelism.
static DEFAULT_SHARD_COUNT: Lazy<usize> = Lazy::new(|| {
    let parallelism = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    (parallelism * 4).next_power_of_two()
});

type Shard<T, E> = RwLock<HashMap<String, CircuitBreaker<T, E>, RandomState>>;

/// A thread-safe map from endpoint key to its circuit breaker.
///
/// Breakers are created lazily on first use and live as long as the registry.
/// Keys are spread over independently locked shards, so traffic for one key
/// never contends with an unrelated key in another shard.
///
/// ```rust
/// use keyed_breaker::{CircuitBreaker, CircuitBreakerRegistry};
/// use std::time::Duration;
///
/// let registry: CircuitBreakerRegistry<String, std::io::Error> = CircuitBreakerRegistry::new();
///
/// let breaker = registry.get_or_create("api-a", || {
///     CircuitBreaker::builder()
///         .failure_threshold(3)
///         .recovery_timeout(Duration::from_secs(5))
///         .fallback_value("Fallback-A".to_string())
///         .build()
/// });
///
/// let again = registry.get_or_create("api-a", || unreachable!());
/// assert!(CircuitBreaker::ptr_eq(&breaker, &again));
/// ```
pub struct CircuitBreakerRegistry<T, E> {
    shards: Box<[Shard<T, E>]>,
    hasher: RandomState,
}

impl<T, E> Default for CircuitBreakerRegistry<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> CircuitBreakerRegistry<T, E> {
    /// Creates an empty registry with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(*DEFAULT_SHARD_COUNT)
    }

    /// Creates an empty registry with at least `shards` shards, rounded up to a power of two.
    pub fn with_shards(shards: usize) -> Self {
        let count = shards.max(1).next_power_of_two();
        let shards = (0..count)
            .map(|_| RwLock::new(HashMap::with_hasher(RandomState::new())))
            .collect();

        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Returns the breaker for `key`, creating it with `factory` if absent.
    ///
    /// The factory runs at most once per key: when several callers race on a
    /// new key, exactly one factory runs and every caller receives the breaker
    /// it produced. The factory runs while the key's shard is locked, so it
    /// must not call back into this registry.
    pub fn get_or_create<F>(&self, key: &str, factory: F) -> CircuitBreaker<T, E>
    where
        F: FnOnce() -> CircuitBreaker<T, E>,
    {
        let shard = self.shard(key);

        if let Some(breaker) = shard.read().get(key) {
            return breaker.clone();
        }

        shard
            .write()
            .entry(key.to_owned())
            .or_insert_with(factory)
            .clone()
    }

    /// Returns the breaker for `key` if one was created.
    pub fn get(&self, key: &str) -> Option<CircuitBreaker<T, E>> {
        self.shard(key).read().get(key).cloned()
    }

    /// Returns true if a breaker exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Number of breakers in the registry.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Returns true if no breaker was created yet.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// Keys of all registered breakers, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.shards
            .iter()
            .flat_map(|shard| shard.read().keys().cloned().collect::<Vec<_>>())
            .collect()
    }

    fn shard(&self, key: &str) -> &Shard<T, E> {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        // Shard count is a power of two.
        let index = (hasher.finish() as usize) & (self.shards.len() - 1);
        &self.shards[index]
    }
}

impl<T, E> fmt::Debug for CircuitBreakerRegistry<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("shards", &self.shards.len())
            .field("breakers", &self.len())
            .finish()
    }
}
