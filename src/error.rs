//! Error types for the circuit breaker library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Result type for circuit breaker operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Error type for circuit breaker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The circuit is open, calls are not permitted.
    Open,

    /// The underlying operation failed.
    Operation(E),

    /// The fallback was invoked and failed as well.
    Fallback(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected without running the operation.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// Returns the wrapped error, if any.
    pub fn inner(&self) -> Option<&E> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(e) | BreakerError::Fallback(e) => Some(e),
        }
    }

    /// Consumes the error and returns the wrapped error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(e) | BreakerError::Fallback(e) => Some(e),
        }
    }
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "Circuit breaker is open"),
            BreakerError::Operation(e) => write!(f, "Operation error: {}", e),
            BreakerError::Fallback(e) => write!(f, "Fallback error: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(e) => Some(e),
            BreakerError::Fallback(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Boom;

    impl Display for Boom {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl Error for Boom {}

    #[test]
    fn display_names_the_kind() {
        assert_eq!(BreakerError::<Boom>::Open.to_string(), "Circuit breaker is open");
        assert_eq!(
            BreakerError::Operation(Boom).to_string(),
            "Operation error: boom"
        );
        assert_eq!(BreakerError::Fallback(Boom).to_string(), "Fallback error: boom");
    }

    #[test]
    fn source_exposes_inner_error() {
        assert!(BreakerError::<Boom>::Open.source().is_none());
        assert!(BreakerError::Operation(Boom).source().is_some());
        assert_eq!(BreakerError::Fallback(Boom).into_inner(), Some(Boom));
    }
}
