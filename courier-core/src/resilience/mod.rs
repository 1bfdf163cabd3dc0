//! # Resilience Patterns
//!
//! Recipes for calling unreliable resources.
//!
//! ## Patterns Included
//!
//! - **Retry**: bounded retry driven by interval strategies, or retry until success
//! - **Circuit Breaker**: fail fast once a trip strategy decides the resource is failing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_core::resilience::{CircuitBreaker, MaxErrorsPerTime, Retry};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new("inventory", MaxErrorsPerTime::new(10, Duration::from_secs(60)));
//!
//! let stock = Retry::with_intervals(&[100, 200, 400])
//!     .execute(|cancel| breaker.execute(|| inventory.fetch(cancel)), &cancel)
//!     .await?;
//! ```

mod circuit_breaker;
mod intervals;
mod retry;
mod strategy;

pub use circuit_breaker::*;
pub use intervals::*;
pub use retry::*;
pub use strategy::*;

use std::borrow::Cow;

/// Classification of failures consumed by the retry policies.
pub trait Classify {
    /// Short name of the failure kind, matched by retry allow-lists.
    fn kind(&self) -> Cow<'_, str>;

    /// Whether the failure is the caller cancelling the operation.
    ///
    /// Such failures are never retried.
    fn is_caller_cancellation(&self) -> bool {
        false
    }
}

impl<E: Classify> Classify for CircuitBreakerError<E> {
    fn kind(&self) -> Cow<'_, str> {
        match self {
            Self::Open { .. } => Cow::Borrowed("CircuitOpen"),
            Self::Failed(e) => e.kind(),
        }
    }

    fn is_caller_cancellation(&self) -> bool {
        matches!(self, Self::Failed(e) if e.is_caller_cancellation())
    }
}
