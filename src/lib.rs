//! # keyed-breaker
//!
//! Circuit breakers for protecting calls to failing downstream endpoints,
//! with a registry that keeps one independent breaker per endpoint key.
//!
//! A breaker tracks consecutive failures of the operations it wraps. Once a
//! failure detection strategy decides the endpoint is unhealthy, the breaker
//! short-circuits further calls and answers with a fallback (or an error)
//! instead of waiting on calls that are likely to fail.
//!
//! ## What is a Circuit Breaker?
//!
//! The Circuit Breaker pattern helps prevent cascading failures in distributed systems
//! by temporarily disabling operations that are likely to fail. This pattern is inspired
//! by electrical circuit breakers and operates in three states:
//!
//! - **Closed**: Normal operation. Calls pass through to the protected resource.
//! - **Open**: Calls are immediately rejected without attempting to reach the resource.
//! - **Half-Open**: After the recovery timeout, a single trial call is let through.
//!   Success closes the circuit, failure opens it again.
//!
//! ## Basic Usage
//!
//! ```rust
//! use keyed_breaker::{BreakerError, CircuitBreaker, State};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct ServiceError(String);
//!
//! let breaker = CircuitBreaker::<String, ServiceError>::builder()
//!     .failure_threshold(3) // Trip after 3 consecutive failures
//!     .recovery_timeout(Duration::from_secs(5)) // Try again after 5 seconds
//!     .build();
//!
//! match breaker.execute(|| Ok("Success".to_string())) {
//!     Ok(result) => println!("Call succeeded: {}", result),
//!     Err(BreakerError::Open) => println!("Circuit is open, call was prevented"),
//!     Err(BreakerError::Operation(err)) => println!("Call failed: {:?}", err),
//!     Err(BreakerError::Fallback(err)) => println!("Fallback failed: {:?}", err),
//! }
//! assert_eq!(breaker.state(), State::Closed);
//! ```
//!
//! ## Per-endpoint registry
//!
//! ```rust
//! use keyed_breaker::{CircuitBreaker, CircuitBreakerRegistry};
//!
//! let registry = CircuitBreakerRegistry::<String, String>::new();
//! let api_b = registry.get_or_create("API-B", || {
//!     CircuitBreaker::builder()
//!         .failure_threshold(2)
//!         .fallback(|_err| Ok("Fallback-B".to_string()))
//!         .build()
//! });
//!
//! for _ in 0..3 {
//!     let result = api_b.execute(|| Err("connection refused".to_string()));
//!     assert_eq!(result.unwrap(), "Fallback-B");
//! }
//! ```
//!
//! ## Async Support
//!
//! With the `async` feature enabled, operations can be futures:
//!
//! ```rust,ignore
//! let result = breaker.execute_async(|| async {
//!     Ok("Success".to_string())
//! }).await;
//! ```
//!
//! ## Features
//!
//! - `async` - `execute_async` and `decorate_async`
//! - `tracing` - Emit state transitions as `tracing` events

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod config;
mod error;
mod hook;
pub mod prelude;
mod registry;
mod state;
pub mod strategy;
mod window;

// Re-exports
pub use breaker::{CircuitBreaker, WeakCircuitBreaker};
pub use config::{BreakerBuilder, BreakerConfig, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT};
pub use error::{BreakerError, BreakerResult};
pub use hook::HookRegistry;
pub use registry::CircuitBreakerRegistry;
pub use state::{Snapshot, State};
pub use strategy::{FailureDetectionStrategy, SlidingWindowStrategy, ThresholdStrategy};
