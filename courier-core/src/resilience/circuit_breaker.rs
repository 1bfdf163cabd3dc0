//! Circuit Breaker pattern implementation.
//!
//! The circuit breaker prevents cascade failures by rejecting calls once its
//! [`TripStrategy`] decides the protected resource is failing too often.
//!
//! ## States
//!
//! - **Closed**: Normal operation, calls pass through
//! - **HalfOpen**: Failures have been observed, calls are rejected
//! - **Open**: Circuit is tripped, calls are rejected
//!
//! Only a `Closed` circuit lets calls through. The state changes solely to
//! the value returned by the strategy, or back to `Closed` on [`reset`].
//!
//! [`reset`]: CircuitBreaker::reset
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_core::resilience::{CircuitBreaker, CircuitBreakerError, MaxErrorsPerTime};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     "billing",
//!     MaxErrorsPerTime::new(10, Duration::from_secs(60)),
//! );
//!
//! match breaker.execute(|| async { billing.charge().await }).await {
//!     Ok(receipt) => Ok(receipt),
//!     Err(CircuitBreakerError::Open { name, last_failure }) => fallback(name, last_failure),
//!     Err(CircuitBreakerError::Failed(e)) => Err(e),
//! }
//! ```

use super::TripStrategy;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through normally.
    Closed,
    /// Circuit has seen failures and rejects calls.
    HalfOpen,
    /// Circuit is open, calls are rejected.
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::HalfOpen => write!(f, "HalfOpen"),
            Self::Open => write!(f, "Open"),
        }
    }
}

/// Circuit breaker error.
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// Circuit is not closed, the action was not invoked.
    Open {
        /// Name of the breaker.
        name: String,
        /// Message of the failure that last tripped the breaker.
        last_failure: Option<String>,
    },
    /// The action was invoked and failed.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open {
                name,
                last_failure: Some(last),
            } => write!(f, "Circuit breaker '{}' is open (last failure: {})", name, last),
            Self::Open { name, .. } => write!(f, "Circuit breaker '{}' is open", name),
            Self::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CircuitBreakerError<E> {}

struct BreakerState {
    state: CircuitState,
    last_failure: Option<String>,
    last_state_change: Option<DateTime<Utc>>,
}

/// Circuit breaker guarding calls to one resource.
pub struct CircuitBreaker {
    name: String,
    strategy: Arc<dyn TripStrategy>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker driven by `strategy`.
    pub fn new(name: impl Into<String>, strategy: impl TripStrategy + 'static) -> Self {
        Self::with_shared_strategy(name, Arc::new(strategy))
    }

    /// Create a closed breaker with a strategy shared with other breakers.
    pub fn with_shared_strategy(name: impl Into<String>, strategy: Arc<dyn TripStrategy>) -> Self {
        let name = name.into();
        info!(name = %name, "Circuit breaker initialized");

        Self {
            name,
            strategy,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                last_failure: None,
                last_state_change: None,
            }),
        }
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether calls are being rejected.
    pub fn is_open(&self) -> bool {
        self.state() != CircuitState::Closed
    }

    /// Whether calls pass through.
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Message of the last failure observed.
    pub fn last_failure(&self) -> Option<String> {
        self.inner.lock().last_failure.clone()
    }

    /// When the state last changed.
    pub fn last_state_change(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_state_change
    }

    /// Close the circuit and forget the last failure.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(name = %self.name, "Circuit breaker CLOSED");
            inner.last_state_change = Some(Utc::now());
        }
        inner.state = CircuitState::Closed;
        inner.last_failure = None;
    }

    /// Execute `action` under circuit breaker protection.
    ///
    /// The action runs without holding the state lock.
    pub async fn execute<F, Fut, T, E>(&self, action: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.execute_ignoring(action, |_| false).await
    }

    /// Like [`execute`](Self::execute), but failures matching `ignore` are
    /// returned without being recorded or counted as a success.
    pub async fn execute_ignoring<F, Fut, T, E, P>(
        &self,
        action: F,
        ignore: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: FnOnce(&E) -> bool,
    {
        {
            let inner = self.inner.lock();
            if inner.state != CircuitState::Closed {
                debug!(name = %self.name, state = %inner.state, "Circuit breaker rejected call");
                return Err(CircuitBreakerError::Open {
                    name: self.name.clone(),
                    last_failure: inner.last_failure.clone(),
                });
            }
        }

        match action().await {
            Ok(value) => {
                self.strategy.mark_success();
                Ok(value)
            }
            Err(e) if ignore(&e) => Err(CircuitBreakerError::Failed(e)),
            Err(e) => {
                self.record_failure(&e);
                Err(CircuitBreakerError::Failed(e))
            }
        }
    }

    fn record_failure(&self, failure: &dyn fmt::Display) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(failure.to_string());

        let previous = inner.state;
        let next = self.strategy.trip(failure, previous);
        inner.state = next;

        if next != previous {
            inner.last_state_change = Some(Utc::now());
            match next {
                CircuitState::Closed => info!(name = %self.name, "Circuit breaker CLOSED"),
                state => warn!(
                    name = %self.name,
                    state = %state,
                    failure = %failure,
                    "Circuit breaker tripped"
                ),
            }
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
