use async_trait::async_trait;
use courier_core::resilience::{
    BackoffIntervals, BackoffStrategy, ExplicitIntervals, Retry, RetryIntervals,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::correlation;
use crate::pipeline::{Decorator, Next};
use crate::{HttpClientError, Request, Response, Result};

type IntervalsFactory = Arc<dyn Fn() -> Box<dyn RetryIntervals> + Send + Sync>;

/// Replays the request through the rest of the chain until it succeeds.
///
/// Every call gets a fresh interval strategy from the factory. Only errors
/// are retried; a response with any status ends the retry session. The
/// correlation id is fixed before the first attempt so every replay carries
/// the same one.
#[derive(Clone)]
pub struct RetryDecorator {
    factory: IntervalsFactory,
}

impl RetryDecorator {
    /// Retry with intervals produced by `factory` for each call.
    pub fn new<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: RetryIntervals + 'static,
    {
        Self {
            factory: Arc::new(move || Box::new(factory()) as Box<dyn RetryIntervals>),
        }
    }

    /// Retry with explicit intervals in milliseconds.
    pub fn with_intervals(millis: &[u64]) -> Self {
        let millis = millis.to_vec();
        Self::new(move || ExplicitIntervals::from_millis(&millis))
    }

    /// Retry `max_retries` times spaced by a back-off curve.
    pub fn with_backoff(strategy: BackoffStrategy, max_retries: u32) -> Self {
        Self::new(move || BackoffIntervals::new(strategy.clone(), max_retries))
    }
}

#[async_trait]
impl Decorator for RetryDecorator {
    async fn handle(
        &self,
        mut request: Request,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<Response> {
        correlation::ensure(&mut request)?;
        let retry = Retry::new((self.factory)());
        retry
            .execute(
                |token| {
                    let request = request.clone();
                    async move { next.run(request, &token).await }
                },
                cancel,
            )
            .await
            .map_err(HttpClientError::from)
    }
}

impl std::fmt::Debug for RetryDecorator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RetryDecorator")
    }
}
