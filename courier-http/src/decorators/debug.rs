use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::pipeline::{Decorator, Next};
use crate::{HttpClientError, Request, Response, Result};

const DELIMITER: &str = "----------------------------------------------------------------";

/// Dumps every request and response at TRACE level.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugDump;

impl DebugDump {
    /// Create the decorator.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Decorator for DebugDump {
    async fn handle(
        &self,
        request: Request,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<Response> {
        let mut dump = String::from(DELIMITER);
        dump.push('\n');
        dump_request(&mut dump, &request);

        let start = Instant::now();
        let result = next.run(request, cancel).await;
        match &result {
            Ok(response) => dump_response(&mut dump, response, start.elapsed().as_millis()),
            Err(e) => dump_error(&mut dump, e),
        }

        dump.push_str(DELIMITER);
        trace!(target: "courier_http::debug", "\n{}", dump);
        result
    }
}

fn dump_request(dump: &mut String, request: &Request) {
    dump.push_str(&format!("REQUEST {} {}\n", request.method(), request.url()));
    dump_headers(dump, request.headers());
    dump_body(dump, request.body());
}

fn dump_response(dump: &mut String, response: &Response, elapsed_ms: u128) {
    let status = response.status();
    dump.push_str(&format!(
        "RESPONSE ==> {} {} ({} ms)\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown"),
        elapsed_ms
    ));
    dump_headers(dump, response.headers());
    dump_body(dump, Some(response.bytes()));
}

fn dump_error(dump: &mut String, error: &HttpClientError) {
    dump.push_str(&format!("==> EXCEPTION {}: {}\n", error.kind_name(), error));
}

fn dump_headers(dump: &mut String, headers: &HeaderMap) {
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .map(|v| v.to_str().unwrap_or("<binary>"))
            .collect();
        dump.push_str(&format!("  {}: {}\n", name, values.join(" ")));
    }
}

fn dump_body(dump: &mut String, body: Option<&Bytes>) {
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        dump.push_str(">>>\n");
        dump.push_str(&String::from_utf8_lossy(body));
        dump.push_str("\n<<<\n");
    }
}
