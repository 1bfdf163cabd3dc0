// Courier - resilient outbound HTTP calls for Rust
//
// This library wraps an HTTP transport in a pipeline of decorators (metrics and
// logging, retry, circuit breaking, request capture) and exposes it through a
// result-returning client and an exception-raising client.

// Re-export the HTTP pipeline
pub use courier_http::*;

// Re-export the resilience recipes
pub use courier_core;
pub use courier_core::{
    BoundedQueue, CircuitBreaker, CircuitBreakerError, CircuitState, MaxErrorsPerTime,
    ParallelError, Retry, RetryError, RetryIntervals, RingBuffer, TripStrategy,
};

/// Prelude for common imports.
///
/// ```
/// use courier::prelude::*;
///
/// # tokio_test::block_on(async {
/// let cancel = CancellationToken::new();
/// let status = Retry::with_intervals(&[10, 20])
///     .execute(|_token| async { Ok::<_, HttpClientError>(StatusCode::OK) }, &cancel)
///     .await
///     .unwrap();
///
/// assert_eq!(status, StatusCode::OK);
/// # });
/// ```
pub mod prelude {
    pub use courier_core::resilience::{CircuitBreaker, MaxErrorsPerTime, Retry};
    pub use courier_core::{BoundedQueue, RingBuffer};
    pub use courier_http::prelude::*;

    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
}
