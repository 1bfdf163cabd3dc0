//! Trip strategies deciding circuit breaker state transitions.

use super::CircuitState;
use crate::collections::RingBuffer;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decides the next circuit state after each protected call.
pub trait TripStrategy: Send + Sync {
    /// Called after the protected action succeeded.
    fn mark_success(&self);

    /// Called after the protected action failed; returns the new state.
    fn trip(&self, failure: &dyn fmt::Display, current: CircuitState) -> CircuitState;
}

/// Clock returning the current instant.
pub type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Trips the circuit when too many failures occur within a time window.
///
/// Failure instants are kept in a ring buffer of `max_errors + 1` entries.
/// On each failure the entries newer than `now - window` are counted:
///
/// | count | state |
/// |---|---|
/// | `> max_errors` | `Open` |
/// | `1..=max_errors` | `HalfOpen` |
/// | `0` | `Closed` |
pub struct MaxErrorsPerTime {
    max_errors: usize,
    window: Duration,
    clock: Clock,
    errors: Mutex<RingBuffer<Instant>>,
}

impl MaxErrorsPerTime {
    /// Create a strategy allowing `max_errors` failures per `window`.
    ///
    /// # Panics
    ///
    /// Panics if `max_errors` is 0.
    pub fn new(max_errors: usize, window: Duration) -> Self {
        Self::with_clock(max_errors, window, Arc::new(Instant::now))
    }

    /// Create a strategy reading time from `clock`.
    pub fn with_clock(max_errors: usize, window: Duration, clock: Clock) -> Self {
        assert!(max_errors > 0, "max_errors must be positive");

        Self {
            max_errors,
            window,
            clock,
            errors: Mutex::new(RingBuffer::new(max_errors + 1)),
        }
    }

    /// Maximum failures tolerated within the window.
    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    /// Length of the counting window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl fmt::Debug for MaxErrorsPerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxErrorsPerTime")
            .field("max_errors", &self.max_errors)
            .field("window", &self.window)
            .finish()
    }
}

impl TripStrategy for MaxErrorsPerTime {
    fn mark_success(&self) {}

    fn trip(&self, _failure: &dyn fmt::Display, _current: CircuitState) -> CircuitState {
        let now = (self.clock)();
        let horizon = now.checked_sub(self.window);

        let count = {
            let mut errors = self.errors.lock();
            errors.push(now);
            match horizon {
                Some(horizon) => errors.count(|at| *at > horizon),
                None => errors.len(),
            }
        };

        if count > self.max_errors {
            CircuitState::Open
        } else if count > 0 {
            CircuitState::HalfOpen
        } else {
            CircuitState::Closed
        }
    }
}
