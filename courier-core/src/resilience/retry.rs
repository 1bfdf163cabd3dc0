//! Retry recipes.
//!
//! Two policies are offered:
//!
//! - [`Retry`] re-attempts while a [`RetryIntervals`] strategy yields positive
//!   back-off intervals. Suited to quick actions with few, short retries where
//!   errors are expected to be transient.
//! - [`UntilSuccess`] keeps calling until the action succeeds, an optional
//!   deadline passes, or a failure outside the allow-list occurs. It is the
//!   "hold at all costs" approach; give it a back-off when the action can fail
//!   quickly, otherwise it spins.
//!
//! In both policies a failure classified as a caller cancellation is never
//! retried, while other cancellation shapes (timeouts) are.
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_core::resilience::Retry;
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let value = Retry::with_intervals(&[100, 200, 400])
//!     .execute(|ct| async move { fetch(ct).await }, &cancel)
//!     .await?;
//! ```

use super::{Classify, ExplicitIntervals, RetryIntervals};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One failed attempt of a retry session.
#[derive(Debug, Clone)]
pub struct FailedAttempt<E> {
    /// When the attempt failed.
    pub at: DateTime<Utc>,
    /// The captured failure.
    pub error: E,
}

impl<E> FailedAttempt<E> {
    /// Record a failure that happened now.
    pub fn new(error: E) -> Self {
        Self {
            at: Utc::now(),
            error,
        }
    }
}

/// Retry error.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The interval strategy was exhausted.
    Exhausted {
        /// Description of the interval strategy used.
        description: String,
        /// Every failed attempt, oldest first.
        attempts: Vec<FailedAttempt<E>>,
    },
    /// The deadline passed before the action succeeded.
    DeadlineReached {
        /// When retrying started.
        started: DateTime<Utc>,
        /// The deadline that was reached.
        deadline: DateTime<Utc>,
    },
    /// The caller's token was cancelled before an attempt or during back-off.
    Cancelled,
    /// A failure that must not be retried, propagated unchanged.
    Aborted(E),
}

impl<E> RetryError<E> {
    /// Failed attempts recorded before exhaustion.
    pub fn attempts(&self) -> &[FailedAttempt<E>] {
        match self {
            Self::Exhausted { attempts, .. } => attempts,
            _ => &[],
        }
    }

    /// The last failure observed, if any.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { attempts, .. } => attempts.last().map(|a| &a.error),
            Self::Aborted(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the caller cancelled the session.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                description,
                attempts,
            } => write!(
                f,
                "Action has failed despite retries (using {}), {} attempts",
                description,
                attempts.len()
            ),
            Self::DeadlineReached { started, deadline } => write!(
                f,
                "Action has failed despite retries. It has reached the deadline {} first. \
                 Retry process has started at {}.",
                deadline, started
            ),
            Self::Cancelled => write!(f, "Retry cancelled by caller"),
            Self::Aborted(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Bounded retry driven by an interval strategy.
#[derive(Debug, Clone)]
pub struct Retry<I> {
    intervals: I,
}

impl Retry<ExplicitIntervals> {
    /// Retry with explicit back-off intervals in milliseconds.
    pub fn with_intervals(millis: &[u64]) -> Self {
        Self::new(ExplicitIntervals::from_millis(millis))
    }

    /// Start an unbounded until-success policy.
    pub fn until_success() -> UntilSuccess {
        UntilSuccess::default()
    }

    /// Run `operation` under an until-success `policy`.
    pub async fn execute_until_success<F, Fut, T, E>(
        policy: &UntilSuccess,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        policy.execute(operation, cancel).await
    }
}

impl<I: RetryIntervals> Retry<I> {
    /// Create a retry session consuming `intervals`.
    pub fn new(intervals: I) -> Self {
        Self { intervals }
    }

    /// Run `operation` until it succeeds or the intervals are exhausted.
    ///
    /// The operation receives a clone of the caller's token.
    pub async fn execute<F, Fut, T, E>(
        mut self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let mut attempts: Vec<FailedAttempt<E>> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let error = match operation(cancel.clone()).await {
                Ok(value) => {
                    if !attempts.is_empty() {
                        debug!(attempt = attempts.len() + 1, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_caller_cancellation() => return Err(RetryError::Aborted(e)),
                Err(e) => e,
            };

            let interval = self.intervals.next_interval();
            debug!(
                attempt = attempts.len() + 1,
                kind = %error.kind(),
                error = %error,
                delay = ?interval,
                "Retry attempt failed"
            );
            attempts.push(FailedAttempt::new(error));

            if interval.is_zero() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }

        let description = self.intervals.describe();
        warn!(
            attempts = attempts.len(),
            intervals = %description,
            "Action has failed despite retries"
        );
        Err(RetryError::Exhausted {
            description,
            attempts,
        })
    }
}

/// Failure kinds retried by [`UntilSuccess`].
#[derive(Debug, Clone, Default)]
pub enum RetryableErrors {
    /// Retry every failure.
    #[default]
    All,
    /// Retry only failures whose [`Classify::kind`] is listed.
    Kinds(Vec<String>),
}

impl RetryableErrors {
    fn allows(&self, kind: &str) -> bool {
        match self {
            Self::All => true,
            Self::Kinds(kinds) => kinds.iter().any(|k| k == kind),
        }
    }
}

/// Unbounded retry that only stops on success, deadline or a
/// non-retryable failure.
#[derive(Debug, Clone, Default)]
pub struct UntilSuccess {
    deadline_after: Option<Duration>,
    backoff: Option<Duration>,
    retry_on: RetryableErrors,
}

impl UntilSuccess {
    /// Give up once `deadline` has elapsed since the first attempt.
    pub fn deadline_after(mut self, deadline: Duration) -> Self {
        self.deadline_after = Some(deadline);
        self
    }

    /// Pause between attempts.
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Only retry failures of the given kinds; others propagate immediately.
    pub fn retry_on<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retry_on = RetryableErrors::Kinds(kinds.into_iter().map(Into::into).collect());
        self
    }

    /// Run `operation` until it succeeds.
    pub async fn execute<F, Fut, T, E>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let started = Utc::now();
        let start = tokio::time::Instant::now();
        let deadline = self.deadline_after.map(|after| start + after);
        let mut attempt: u64 = 0;

        while deadline.is_none_or(|d| tokio::time::Instant::now() < d) {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempt += 1;

            match operation(cancel.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_caller_cancellation() => return Err(RetryError::Aborted(e)),
                Err(e) if !self.retry_on.allows(&e.kind()) => {
                    debug!(attempt, kind = %e.kind(), "Failure is not retryable");
                    return Err(RetryError::Aborted(e));
                }
                Err(e) => {
                    debug!(attempt, kind = %e.kind(), error = %e, "Retrying until success");
                }
            }

            if let Some(backoff) = self.backoff {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        let elapsed = self.deadline_after.unwrap_or_default();
        let deadline = started
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        warn!(attempts = attempt, %started, %deadline, "Retry deadline reached");
        Err(RetryError::DeadlineReached { started, deadline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Flaky,
        Timeout,
        CallerCancelled,
        Fatal,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Classify for TestError {
        fn kind(&self) -> Cow<'_, str> {
            Cow::Owned(format!("{:?}", self))
        }

        fn is_caller_cancellation(&self) -> bool {
            matches!(self, TestError::CallerCancelled)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_first_try() {
        let cancel = CancellationToken::new();

        let result: Result<i32, RetryError<TestError>> = Retry::with_intervals(&[10])
            .execute(|_| async { Ok(42) }, &cancel)
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_intervals_plus_one_attempts() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = Retry::with_intervals(&[100, 200, 400])
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Flaky) }
                },
                &cancel,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let err = result.unwrap_err();
        assert_eq!(err.attempts().len(), 4);
        assert_eq!(err.last_error(), Some(&TestError::Flaky));
        assert!(err.to_string().contains("intervals 100, 200, 400 ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_retried() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = Retry::with_intervals(&[5, 5])
            .execute(
                |_| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(TestError::Timeout)
                        } else {
                            Ok("done")
                        }
                    }
                },
                &cancel,
            )
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancellation_is_not_retried() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = Retry::with_intervals(&[1000, 1000])
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::CallerCancelled) }
                },
                &cancel,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Aborted(TestError::CallerCancelled))
        ));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_stops_before_attempt() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), RetryError<TestError>> = Retry::with_intervals(&[10])
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
                &cancel,
            )
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_success_keeps_trying() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = Retry::until_success()
            .backoff(Duration::from_millis(10))
            .execute(
                |_| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 9 {
                            Err(TestError::Flaky)
                        } else {
                            Ok(n)
                        }
                    }
                },
                &cancel,
            )
            .await;

        assert_eq!(result.unwrap(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_success_reaches_deadline() {
        let cancel = CancellationToken::new();

        let result: Result<(), _> = UntilSuccess::default()
            .deadline_after(Duration::from_millis(100))
            .backoff(Duration::from_millis(30))
            .execute(|_| async { Err(TestError::Flaky) }, &cancel)
            .await;

        match result {
            Err(RetryError::DeadlineReached { started, deadline }) => {
                assert_eq!((deadline - started).num_milliseconds(), 100);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_success_propagates_unlisted_failure() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = UntilSuccess::default()
            .retry_on(["Timeout"])
            .execute(
                |_| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(TestError::Timeout)
                        } else {
                            Err(TestError::Fatal)
                        }
                    }
                },
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Aborted(TestError::Fatal))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_success_never_retries_caller_cancellation() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<(), _> = UntilSuccess::default()
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::CallerCancelled) }
                },
                &cancel,
            )
            .await;

        assert!(matches!(
            result,
            Err(RetryError::Aborted(TestError::CallerCancelled))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
