//! Call naming and success analysis for metrics and logs.

use crate::request::Request;
use crate::response::Response;

/// Names calls and decides which responses count as successful.
pub trait CallAnalyzer: Send + Sync {
    /// Name of the call, used in logs, metrics and capture file names.
    fn call_name(&self, request: &Request) -> String;

    /// Whether the response counts as a success.
    fn is_response_successful(&self, response: &Response) -> bool;

    /// Metric context the call is recorded in.
    fn metric_context_name(&self) -> &str;
}

/// Names calls `METHOD path` and treats 2xx as success.
#[derive(Debug, Clone)]
pub struct DefaultCallAnalyzer {
    context: String,
}

impl DefaultCallAnalyzer {
    /// Analyzer recording into `context`.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

impl Default for DefaultCallAnalyzer {
    fn default() -> Self {
        Self::new("http")
    }
}

impl CallAnalyzer for DefaultCallAnalyzer {
    fn call_name(&self, request: &Request) -> String {
        format!("{} {}", request.method(), request.url().path())
    }

    fn is_response_successful(&self, response: &Response) -> bool {
        response.is_success()
    }

    fn metric_context_name(&self) -> &str {
        &self.context
    }
}
