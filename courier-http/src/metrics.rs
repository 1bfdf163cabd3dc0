//! Call metrics.
//!
//! Counters are named `HttpStatus`, `Success` and `Error`; the call timer is
//! named `Elapsed`. All of them are scoped by the analyzer's metric context
//! and the call name.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Counter incremented with the response status code.
pub const HTTP_STATUS: &str = "HttpStatus";
/// Counter incremented on successful calls.
pub const SUCCESS: &str = "Success";
/// Counter incremented on failed calls.
pub const ERROR: &str = "Error";
/// Timer measuring call duration.
pub const ELAPSED: &str = "Elapsed";

/// Default buckets for call latency (in seconds)
pub const DEFAULT_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Metrics sink for HTTP calls.
pub trait MetricsRecorder: Send + Sync {
    /// Increment the counter `name`.
    fn increment(&self, context: &str, call: &str, name: &str);

    /// Increment the `HttpStatus` counter for `status`.
    fn increment_status(&self, context: &str, call: &str, status: u16);

    /// Record the duration of timer `name`.
    fn record_elapsed(&self, context: &str, call: &str, name: &str, elapsed: Duration);
}

/// Records the elapsed time when dropped, on every exit path.
pub struct TimerGuard<'a> {
    recorder: &'a dyn MetricsRecorder,
    context: &'a str,
    call: &'a str,
    start: Instant,
}

impl<'a> TimerGuard<'a> {
    /// Start the `Elapsed` timer.
    pub fn start(recorder: &'a dyn MetricsRecorder, context: &'a str, call: &'a str) -> Self {
        Self {
            recorder,
            context,
            call,
            start: Instant::now(),
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.recorder
            .record_elapsed(self.context, self.call, ELAPSED, self.start.elapsed());
    }
}

/// Recorder that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn increment(&self, _context: &str, _call: &str, _name: &str) {}

    fn increment_status(&self, _context: &str, _call: &str, _status: u16) {}

    fn record_elapsed(&self, _context: &str, _call: &str, _name: &str, _elapsed: Duration) {}
}

/// Prometheus backed recorder.
#[derive(Clone)]
pub struct PrometheusMetrics {
    calls: CounterVec,
    statuses: CounterVec,
    durations: HistogramVec,
}

static GLOBAL: Lazy<Option<PrometheusMetrics>> = Lazy::new(|| {
    match PrometheusMetrics::new(prometheus::default_registry()) {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            warn!(error = %e, "Failed to register HTTP call metrics");
            None
        }
    }
});

impl PrometheusMetrics {
    /// Register the call metrics in `registry`.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let calls = CounterVec::new(
            Opts::new("courier_http_calls_total", "Outbound HTTP calls by outcome"),
            &["context", "call", "name"],
        )?;
        let statuses = CounterVec::new(
            Opts::new("courier_http_status_total", "Outbound HTTP responses by status code"),
            &["context", "call", "status"],
        )?;
        let durations = HistogramVec::new(
            HistogramOpts::new(
                "courier_http_call_duration_seconds",
                "Outbound HTTP call duration in seconds",
            )
            .buckets(DEFAULT_LATENCY_BUCKETS.to_vec()),
            &["context", "call", "name"],
        )?;

        registry.register(Box::new(calls.clone()))?;
        registry.register(Box::new(statuses.clone()))?;
        registry.register(Box::new(durations.clone()))?;

        Ok(Self {
            calls,
            statuses,
            durations,
        })
    }

    /// Recorder registered in the default prometheus registry.
    pub fn global() -> Option<Self> {
        GLOBAL.clone()
    }
}

impl MetricsRecorder for PrometheusMetrics {
    fn increment(&self, context: &str, call: &str, name: &str) {
        self.calls.with_label_values(&[context, call, name]).inc();
    }

    fn increment_status(&self, context: &str, call: &str, status: u16) {
        let status = status.to_string();
        self.statuses
            .with_label_values(&[context, call, status.as_str()])
            .inc();
    }

    fn record_elapsed(&self, context: &str, call: &str, name: &str, elapsed: Duration) {
        self.durations
            .with_label_values(&[context, call, name])
            .observe(elapsed.as_secs_f64());
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

/// In-memory recorder, handy for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetrics {
    inner: Arc<Mutex<InMemoryState>>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    counters: HashMap<(String, String, String), u64>,
    statuses: HashMap<(String, u16), u64>,
    timings: HashMap<(String, String, String), Vec<Duration>>,
}

impl InMemoryMetrics {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of counter `name` summed over all calls of `context`.
    pub fn counter(&self, context: &str, name: &str) -> u64 {
        self.inner
            .lock()
            .counters
            .iter()
            .filter(|((ctx, _, n), _)| ctx == context && n == name)
            .map(|(_, value)| *value)
            .sum()
    }

    /// Number of responses of `status` in `context`.
    pub fn status_count(&self, context: &str, status: u16) -> u64 {
        self.inner
            .lock()
            .statuses
            .get(&(context.to_string(), status))
            .copied()
            .unwrap_or(0)
    }

    /// Number of timings recorded for `name` in `context`.
    pub fn timing_count(&self, context: &str, name: &str) -> usize {
        self.inner
            .lock()
            .timings
            .iter()
            .filter(|((ctx, _, n), _)| ctx == context && n == name)
            .map(|(_, values)| values.len())
            .sum()
    }
}

impl MetricsRecorder for InMemoryMetrics {
    fn increment(&self, context: &str, call: &str, name: &str) {
        *self
            .inner
            .lock()
            .counters
            .entry((context.to_string(), call.to_string(), name.to_string()))
            .or_default() += 1;
    }

    fn increment_status(&self, context: &str, call: &str, status: u16) {
        let mut inner = self.inner.lock();
        *inner
            .statuses
            .entry((context.to_string(), status))
            .or_default() += 1;
        *inner
            .counters
            .entry((context.to_string(), call.to_string(), HTTP_STATUS.to_string()))
            .or_default() += 1;
    }

    fn record_elapsed(&self, context: &str, call: &str, name: &str, elapsed: Duration) {
        self.inner
            .lock()
            .timings
            .entry((context.to_string(), call.to_string(), name.to_string()))
            .or_default()
            .push(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_counters() {
        let metrics = InMemoryMetrics::new();
        metrics.increment("api", "GET /a", SUCCESS);
        metrics.increment("api", "GET /b", SUCCESS);
        metrics.increment("api", "GET /b", ERROR);
        metrics.increment_status("api", "GET /b", 404);

        assert_eq!(metrics.counter("api", SUCCESS), 2);
        assert_eq!(metrics.counter("api", ERROR), 1);
        assert_eq!(metrics.counter("api", HTTP_STATUS), 1);
        assert_eq!(metrics.status_count("api", 404), 1);
        assert_eq!(metrics.counter("other", SUCCESS), 0);
    }

    #[test]
    fn test_timer_guard_records_on_drop() {
        let metrics = InMemoryMetrics::new();
        {
            let _timer = TimerGuard::start(&metrics, "api", "GET /a");
        }

        assert_eq!(metrics.timing_count("api", ELAPSED), 1);
    }

    #[test]
    fn test_prometheus_registration() {
        let registry = Registry::new();
        let metrics = PrometheusMetrics::new(&registry).unwrap();
        metrics.increment("api", "GET /a", SUCCESS);
        metrics.increment_status("api", "GET /a", 200);
        metrics.record_elapsed("api", "GET /a", ELAPSED, Duration::from_millis(5));

        let text = prometheus::TextEncoder::new()
            .encode_to_string(&registry.gather())
            .unwrap();
        assert!(text.contains("courier_http_calls_total"));
        assert!(text.contains("courier_http_call_duration_seconds"));

        // Second registration under the same names is rejected.
        assert!(PrometheusMetrics::new(&registry).is_err());
    }
}
