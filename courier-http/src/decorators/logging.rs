use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

use super::{format_headers, is_text_content};
use crate::analyzer::CallAnalyzer;
use crate::correlation;
use crate::metrics::{ERROR, MetricsRecorder, SUCCESS, TimerGuard};
use crate::pipeline::{Decorator, Next};
use crate::{Request, Response, Result};

/// Body bytes logged at most, by default.
pub const DEFAULT_MAX_LOGGED_BODY_LENGTH: usize = 64 * 1024;

/// Records call metrics and logs every call with its correlation id.
///
/// The correlation id is taken from the `X-CorrelationId` header, then from
/// the `CorrelationId` property, or minted; it is attached as a header when
/// missing. Each call runs inside a span carrying `correlation_id` and
/// `call_name`.
///
/// ```no_run
/// use courier_http::decorators::MetricsAndLogging;
/// use courier_http::{DefaultCallAnalyzer, NoopMetrics, PipelineBuilder};
///
/// let mut builder = PipelineBuilder::new();
/// builder.with(MetricsAndLogging::new(DefaultCallAnalyzer::new("omdb"), NoopMetrics).log_body(true));
/// ```
pub struct MetricsAndLogging {
    analyzer: Arc<dyn CallAnalyzer>,
    metrics: Arc<dyn MetricsRecorder>,
    log_body: bool,
    max_logged_body_length: usize,
}

impl MetricsAndLogging {
    /// Create the decorator.
    pub fn new(analyzer: impl CallAnalyzer + 'static, metrics: impl MetricsRecorder + 'static) -> Self {
        Self::with_shared(Arc::new(analyzer), Arc::new(metrics))
    }

    /// Create the decorator from shared collaborators.
    pub fn with_shared(analyzer: Arc<dyn CallAnalyzer>, metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            analyzer,
            metrics,
            log_body: false,
            max_logged_body_length: DEFAULT_MAX_LOGGED_BODY_LENGTH,
        }
    }

    /// Include request and response bodies in the logs.
    pub fn log_body(mut self, enabled: bool) -> Self {
        self.log_body = enabled;
        self
    }

    /// Cap on logged body length.
    pub fn max_logged_body_length(mut self, max: usize) -> Self {
        self.max_logged_body_length = max;
        self
    }

    fn render_body(&self, body: Option<&Bytes>, content_type: Option<&str>) -> Option<String> {
        if !self.log_body {
            return None;
        }
        let body = body.filter(|b| !b.is_empty())?;
        Some(render_body(body, content_type, self.max_logged_body_length))
    }

    fn log_response(&self, call_name: &str, request: &Request, response: &Response, success: bool) {
        let method = request.method().as_str();
        let uri = request.url().as_str();
        let status = response.status().as_u16();
        let request_headers = format_headers(request.headers());
        let response_headers = format_headers(response.headers());
        let request_body = self.render_body(request.body(), request.content_type());
        let response_body = self.render_body(Some(response.bytes()), response.content_type());

        if success {
            debug!(
                call = %call_name,
                method,
                uri,
                status,
                request_headers = ?request_headers,
                response_headers = ?response_headers,
                request_body = request_body.as_deref(),
                response_body = response_body.as_deref(),
                "HTTP call succeeded"
            );
        } else {
            warn!(
                call = %call_name,
                method,
                uri,
                status,
                request_headers = ?request_headers,
                response_headers = ?response_headers,
                request_body = request_body.as_deref(),
                response_body = response_body.as_deref(),
                "HTTP call failed"
            );
        }
    }
}

#[async_trait]
impl Decorator for MetricsAndLogging {
    async fn handle(
        &self,
        mut request: Request,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<Response> {
        let correlation_id = correlation::ensure(&mut request)?;
        let call_name = self.analyzer.call_name(&request);
        let context = self.analyzer.metric_context_name();
        let span = info_span!("http_call", correlation_id = %correlation_id, call_name = %call_name);

        async {
            let _timer = TimerGuard::start(self.metrics.as_ref(), context, &call_name);

            match next.run(request.clone(), cancel).await {
                Ok(response) => {
                    self.metrics
                        .increment_status(context, &call_name, response.status().as_u16());
                    let success = self.analyzer.is_response_successful(&response);
                    self.metrics
                        .increment(context, &call_name, if success { SUCCESS } else { ERROR });
                    self.log_response(&call_name, &request, &response, success);
                    Ok(response)
                }
                Err(e) => {
                    self.metrics.increment(context, &call_name, ERROR);
                    let request_headers = format_headers(request.headers());
                    let request_body = self.render_body(request.body(), request.content_type());
                    error!(
                        call = %call_name,
                        method = request.method().as_str(),
                        uri = request.url().as_str(),
                        error = %e,
                        request_headers = ?request_headers,
                        request_body = request_body.as_deref(),
                        "HTTP call failed with {}",
                        e.kind_name()
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Text bodies are truncated to `max` characters, binary ones are rendered
/// as hex of their first `max` bytes.
fn render_body(body: &[u8], content_type: Option<&str>, max: usize) -> String {
    if is_text_content(content_type) {
        let text = String::from_utf8_lossy(body);
        match text.char_indices().nth(max) {
            Some((end, _)) => text[..end].to_string(),
            None => text.into_owned(),
        }
    } else {
        hex::encode_upper(&body[..body.len().min(max)])
    }
}
