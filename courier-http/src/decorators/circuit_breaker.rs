use async_trait::async_trait;
use courier_core::resilience::{CircuitBreaker, CircuitBreakerError, Classify};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{Decorator, Next};
use crate::{HttpClientError, Request, Response, Result};

/// Guards the rest of the chain with a circuit breaker.
///
/// While the breaker is not closed, calls fail with
/// [`HttpClientError::CircuitOpen`] without reaching the transport.
/// Cancellations requested by the caller are passed through without
/// counting as failures.
#[derive(Debug, Clone)]
pub struct CircuitBreakerDecorator {
    breaker: Arc<CircuitBreaker>,
    trip_on_server_errors: bool,
}

impl CircuitBreakerDecorator {
    /// Guard calls with `breaker`.
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            breaker,
            trip_on_server_errors: false,
        }
    }

    /// Count 5xx responses as failures. The response is still returned.
    pub fn trip_on_server_errors(mut self, enabled: bool) -> Self {
        self.trip_on_server_errors = enabled;
        self
    }

    /// The guarding breaker.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

enum GuardedFailure {
    Error(HttpClientError),
    ServerError(Response),
}

impl fmt::Display for GuardedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardedFailure::Error(e) => write!(f, "{}", e),
            GuardedFailure::ServerError(response) => {
                write!(f, "HTTP call failed with status {}", response.status())
            }
        }
    }
}

#[async_trait]
impl Decorator for CircuitBreakerDecorator {
    async fn handle(
        &self,
        request: Request,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<Response> {
        let trip_on_server_errors = self.trip_on_server_errors;
        let result = self
            .breaker
            .execute_ignoring(
                || async move {
                    match next.run(request, cancel).await {
                        Ok(response) if trip_on_server_errors && response.is_server_error() => {
                            Err(GuardedFailure::ServerError(response))
                        }
                        Ok(response) => Ok(response),
                        Err(e) => Err(GuardedFailure::Error(e)),
                    }
                },
                |failure| {
                    matches!(failure, GuardedFailure::Error(e) if e.is_caller_cancellation())
                },
            )
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(CircuitBreakerError::Open { name, last_failure }) => {
                Err(HttpClientError::CircuitOpen { name, last_failure })
            }
            Err(CircuitBreakerError::Failed(GuardedFailure::Error(e))) => Err(e),
            Err(CircuitBreakerError::Failed(GuardedFailure::ServerError(response))) => {
                Ok(response)
            }
        }
    }
}
