//! Back-off interval strategies consumed by [`Retry`](super::Retry).
//!
//! A strategy yields the pause before each re-attempt. Yielding
//! [`Duration::ZERO`] means the strategy is exhausted and retrying stops.

use std::time::Duration;

/// Source of back-off intervals for one retry session.
pub trait RetryIntervals: Send {
    /// Next pause; `Duration::ZERO` once exhausted.
    fn next_interval(&mut self) -> Duration;

    /// Human readable description used in retry errors.
    fn describe(&self) -> String {
        "custom intervals".to_string()
    }
}

impl<I: RetryIntervals + ?Sized> RetryIntervals for Box<I> {
    fn next_interval(&mut self) -> Duration {
        (**self).next_interval()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Intervals given explicitly as a finite sequence.
///
/// Non-positive entries are dropped at construction.
///
/// ```
/// use courier_core::resilience::{ExplicitIntervals, RetryIntervals};
/// use std::time::Duration;
///
/// let mut intervals = ExplicitIntervals::from_millis(&[100, 0, 200]);
/// assert_eq!(intervals.next_interval(), Duration::from_millis(100));
/// assert_eq!(intervals.next_interval(), Duration::from_millis(200));
/// assert_eq!(intervals.next_interval(), Duration::ZERO);
/// ```
#[derive(Debug, Clone)]
pub struct ExplicitIntervals {
    intervals: Vec<Duration>,
    at: usize,
}

impl ExplicitIntervals {
    /// Create from durations.
    pub fn new(intervals: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            intervals: intervals.into_iter().filter(|d| !d.is_zero()).collect(),
            at: 0,
        }
    }

    /// Create from milliseconds.
    pub fn from_millis(millis: &[u64]) -> Self {
        Self::new(millis.iter().map(|ms| Duration::from_millis(*ms)))
    }

    /// Number of intervals, i.e. the number of re-attempts allowed.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether no re-attempt is allowed.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

impl RetryIntervals for ExplicitIntervals {
    fn next_interval(&mut self) -> Duration {
        match self.intervals.get(self.at) {
            Some(interval) => {
                self.at += 1;
                *interval
            }
            None => Duration::ZERO,
        }
    }

    fn describe(&self) -> String {
        let millis: Vec<String> = self
            .intervals
            .iter()
            .map(|d| d.as_millis().to_string())
            .collect();
        format!("intervals {} ms", millis.join(", "))
    }
}

/// Strategy that never allows a re-attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntervals;

impl RetryIntervals for NoIntervals {
    fn next_interval(&mut self) -> Duration {
        Duration::ZERO
    }

    fn describe(&self) -> String {
        "no retries".to_string()
    }
}

/// Back-off curve.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant(Duration),
    /// Linear backoff: delay increases by a fixed amount.
    Linear {
        /// Initial delay.
        initial: Duration,
        /// Increment per retry.
        increment: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff with up to 50% jitter.
    ExponentialWithJitter {
        /// Initial delay.
        initial: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Create constant backoff.
    pub fn constant(delay: Duration) -> Self {
        Self::Constant(delay)
    }

    /// Create linear backoff.
    pub fn linear(initial: Duration, increment: Duration) -> Self {
        Self::Linear {
            initial,
            increment,
            max: Duration::from_secs(60),
        }
    }

    /// Create exponential backoff.
    pub fn exponential(initial: Duration) -> Self {
        Self::Exponential {
            initial,
            multiplier: 2.0,
            max: Duration::from_secs(60),
        }
    }

    /// Create exponential backoff with jitter.
    pub fn exponential_with_jitter(initial: Duration) -> Self {
        Self::ExponentialWithJitter {
            initial,
            multiplier: 2.0,
            max: Duration::from_secs(60),
        }
    }

    /// Set maximum delay.
    pub fn with_max(self, max: Duration) -> Self {
        match self {
            Self::Linear {
                initial, increment, ..
            } => Self::Linear {
                initial,
                increment,
                max,
            },
            Self::Exponential {
                initial,
                multiplier,
                ..
            } => Self::Exponential {
                initial,
                multiplier,
                max,
            },
            Self::ExponentialWithJitter {
                initial,
                multiplier,
                ..
            } => Self::ExponentialWithJitter {
                initial,
                multiplier,
                max,
            },
            other => other,
        }
    }

    /// Delay for a given retry (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::Constant(d) => *d,
            Self::Linear {
                initial,
                increment,
                max,
            } => initial.saturating_add(increment.saturating_mul(attempt)).min(*max),
            Self::Exponential {
                initial,
                multiplier,
                max,
            } => Duration::from_millis(exponential_millis(*initial, *multiplier, attempt)).min(*max),
            Self::ExponentialWithJitter {
                initial,
                multiplier,
                max,
            } => {
                let base_millis = exponential_millis(*initial, *multiplier, attempt);
                let jitter = (base_millis as f64 * rand::random::<f64>() * 0.5) as u64;
                Duration::from_millis(base_millis.saturating_add(jitter)).min(*max)
            }
        }
    }
}

/// `initial * multiplier^attempt` in milliseconds, saturating at `u64::MAX`.
fn exponential_millis(initial: Duration, multiplier: f64, attempt: u32) -> u64 {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    // float to int casts saturate, infinity included
    (initial.as_millis() as f64 * multiplier.powi(exponent)) as u64
}

/// Intervals following a [`BackoffStrategy`] for a fixed number of retries.
#[derive(Debug, Clone)]
pub struct BackoffIntervals {
    strategy: BackoffStrategy,
    max_retries: u32,
    attempt: u32,
}

impl BackoffIntervals {
    /// Allow `max_retries` re-attempts spaced by `strategy`.
    pub fn new(strategy: BackoffStrategy, max_retries: u32) -> Self {
        Self {
            strategy,
            max_retries,
            attempt: 0,
        }
    }
}

impl RetryIntervals for BackoffIntervals {
    fn next_interval(&mut self) -> Duration {
        if self.attempt >= self.max_retries {
            return Duration::ZERO;
        }
        let delay = self.strategy.delay_for_attempt(self.attempt);
        self.attempt += 1;
        delay
    }

    fn describe(&self) -> String {
        format!("{:?} backoff, {} retries", self.strategy, self.max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_intervals_drop_zero_entries() {
        let intervals = ExplicitIntervals::from_millis(&[0, 50, 0, 75]);

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals.describe(), "intervals 50, 75 ms");
    }

    #[test]
    fn test_explicit_intervals_exhaust() {
        let mut intervals = ExplicitIntervals::from_millis(&[100, 200, 400]);

        assert_eq!(intervals.next_interval(), Duration::from_millis(100));
        assert_eq!(intervals.next_interval(), Duration::from_millis(200));
        assert_eq!(intervals.next_interval(), Duration::from_millis(400));
        assert_eq!(intervals.next_interval(), Duration::ZERO);
        assert_eq!(intervals.next_interval(), Duration::ZERO);
    }

    #[test]
    fn test_backoff_saturates_at_max_for_huge_attempts() {
        let max = Duration::from_secs(30);
        let strategies = [
            BackoffStrategy::linear(Duration::from_secs(1), Duration::from_secs(u64::MAX / 2)).with_max(max),
            BackoffStrategy::exponential(Duration::from_millis(100)).with_max(max),
            BackoffStrategy::exponential_with_jitter(Duration::from_millis(100)).with_max(max),
        ];

        for strategy in &strategies {
            for attempt in [64, 1_000, u32::MAX] {
                assert_eq!(strategy.delay_for_attempt(attempt), max, "{:?} at {}", strategy, attempt);
            }
        }
    }

    #[test]
    fn test_no_intervals() {
        assert_eq!(NoIntervals.next_interval(), Duration::ZERO);
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = BackoffStrategy::exponential(Duration::from_millis(100));

        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_linear_backoff_is_capped() {
        let backoff = BackoffStrategy::linear(Duration::from_millis(100), Duration::from_millis(100))
            .with_max(Duration::from_millis(250));

        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_attempt(5), Duration::from_millis(250));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = BackoffStrategy::exponential_with_jitter(Duration::from_millis(100));
        let delay = backoff.delay_for_attempt(1);

        assert!(delay >= Duration::from_millis(200));
        assert!(delay <= Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_intervals_limit_retries() {
        let mut intervals =
            BackoffIntervals::new(BackoffStrategy::constant(Duration::from_millis(10)), 2);

        assert_eq!(intervals.next_interval(), Duration::from_millis(10));
        assert_eq!(intervals.next_interval(), Duration::from_millis(10));
        assert_eq!(intervals.next_interval(), Duration::ZERO);
    }
}
