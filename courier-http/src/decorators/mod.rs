//! Cross-cutting decorators for the call pipeline.

mod capture;
mod circuit_breaker;
mod debug;
mod logging;
mod retry;

pub use capture::{CaptureToFile, file_extension};
pub use circuit_breaker::CircuitBreakerDecorator;
pub use debug::DebugDump;
pub use logging::{DEFAULT_MAX_LOGGED_BODY_LENGTH, MetricsAndLogging};
pub use retry::RetryDecorator;

/// Whether a body of `content_type` can be rendered as text.
pub(crate) fn is_text_content(content_type: Option<&str>) -> bool {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    !matches!(
        media_type.as_deref(),
        Some("application/octet-stream" | "application/protobuf" | "application/x-protobuf")
    )
}

/// `name: value` pairs of a header map, with credentials masked.
pub(crate) fn format_headers(headers: &http::HeaderMap) -> Vec<String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if *name == http::header::AUTHORIZATION {
                "***"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{}: {}", name, value)
        })
        .collect()
}
