//! # Courier Core
//!
//! Resilience recipes used by the Courier HTTP pipeline, usable on their own
//! around any fallible async operation.
//!
//! ## Features
//!
//! - **Retry**: bounded retry driven by interval strategies, or retry until success
//! - **Circuit Breaker**: fail fast with pluggable trip strategies
//! - **Bounded Collections**: ring buffer and size-limited queue
//! - **Bounded Parallelism**: process a collection with a fixed number of workers
//! - **Logging**: `tracing` subscriber initialisation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier_core::resilience::{Retry, RetryError};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[derive(Debug)] struct Flaky;
//! # impl std::fmt::Display for Flaky {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "flaky") }
//! # }
//! # impl courier_core::resilience::Classify for Flaky {
//! #     fn kind(&self) -> std::borrow::Cow<'_, str> { "Flaky".into() }
//! # }
//! # async fn ping(_: CancellationToken) -> Result<u16, Flaky> { Ok(200) }
//! #[tokio::main]
//! async fn main() -> Result<(), RetryError<Flaky>> {
//!     let cancel = CancellationToken::new();
//!     let status = Retry::with_intervals(&[100, 200, 400])
//!         .execute(ping, &cancel)
//!         .await?;
//!
//!     println!("Status: {}", status);
//!     Ok(())
//! }
//! ```

pub mod collections;
pub mod logging;
pub mod parallel;
pub mod resilience;

pub use collections::{BoundedQueue, RingBuffer};
pub use parallel::ParallelError;
pub use resilience::{
    CircuitBreaker, CircuitBreakerError, CircuitState, Classify, MaxErrorsPerTime, Retry,
    RetryError, RetryIntervals, TripStrategy,
};
