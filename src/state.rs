//! Circuit breaker state and the bookkeeping guarded by the breaker lock.

use atomic::{Atomic, Ordering};
use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed and operations are allowed.
    Closed,

    /// Circuit is open and operations are rejected.
    Open,

    /// Circuit is letting a single trial call through to test recovery.
    HalfOpen,
}

impl State {
    /// Short lowercase label, used for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consistent point-in-time view of a breaker's mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current state.
    pub state: State,

    /// Consecutive failures since the last reset.
    pub failure_count: u32,

    /// Time of the most recent failure, `None` if the breaker never failed.
    pub last_failure_time: Option<Instant>,
}

/// How a call was let through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Regular call while closed.
    Normal,
    /// The single trial call after the recovery timeout.
    Trial,
}

/// A state change produced while holding the breaker lock, reported after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: State,
    pub(crate) to: State,
}

/// The `{state, failure_count, last_failure_time}` triple.
///
/// Only ever touched while the owning breaker's mutex is held.
#[derive(Debug)]
pub(crate) struct Counters {
    pub(crate) state: State,
    pub(crate) failure_count: u32,
    pub(crate) last_failure_time: Option<Instant>,
}

impl Counters {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Closed,
            failure_count: 0,
            last_failure_time: None,
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            failure_count: self.failure_count,
            last_failure_time: self.last_failure_time,
        }
    }

    /// Whether the recovery timeout has passed since the last failure.
    ///
    /// A breaker that never failed is always eligible.
    pub(crate) fn recovery_elapsed(&self, now: Instant, recovery_timeout: Duration) -> bool {
        match self.last_failure_time {
            Some(at) => now.saturating_duration_since(at) >= recovery_timeout,
            None => true,
        }
    }

    pub(crate) fn move_to(&mut self, to: State) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        Some(Transition { from, to })
    }
}

/// Lock-free mirror of the current state for readers.
///
/// Written only while the breaker lock is held, so it never runs ahead of the
/// guarded [`Counters`].
pub(crate) struct StateMirror {
    state: Atomic<State>,
}

impl StateMirror {
    pub(crate) fn new() -> Self {
        Self {
            state: Atomic::new(State::Closed),
        }
    }

    pub(crate) fn current(&self) -> State {
        self.state.load(Ordering::Acquire)
    }

    pub(crate) fn publish(&self, state: State) {
        self.state.store(state, Ordering::Release);
    }
}
