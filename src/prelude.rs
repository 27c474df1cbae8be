//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust
//! use keyed_breaker::prelude::*;
//!
//! let registry: CircuitBreakerRegistry<u32, String> = CircuitBreakerRegistry::new();
//! let breaker = registry.get_or_create("db", || CircuitBreaker::builder().build());
//! assert_eq!(breaker.state(), State::Closed);
//! ```

pub use crate::breaker::CircuitBreaker;
pub use crate::error::{BreakerError, BreakerResult};
pub use crate::registry::CircuitBreakerRegistry;
pub use crate::state::State;
pub use crate::strategy::FailureDetectionStrategy;
