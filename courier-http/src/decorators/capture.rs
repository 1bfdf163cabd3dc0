use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::analyzer::CallAnalyzer;
use crate::correlation;
use crate::pipeline::{Decorator, Next};
use crate::{HttpClientError, Request, Response, Result};

/// Writes request and response bodies to files.
///
/// Files land in `<root>/<yyyy-MM-dd>/<call>_<correlation id>_{req|resp}.<ext>`.
/// Empty bodies are skipped. Write failures are logged and ignored unless
/// [`propagate_errors`](Self::propagate_errors) is set.
pub struct CaptureToFile {
    root: PathBuf,
    analyzer: Arc<dyn CallAnalyzer>,
    propagate_errors: bool,
}

impl CaptureToFile {
    /// Capture under `root`, expanding `$VAR`, `${VAR}` and `%VAR%`
    /// environment references.
    pub fn new(root: impl AsRef<str>, analyzer: impl CallAnalyzer + 'static) -> Self {
        Self::with_shared_analyzer(root, Arc::new(analyzer))
    }

    /// Capture under `root` with a shared analyzer.
    pub fn with_shared_analyzer(root: impl AsRef<str>, analyzer: Arc<dyn CallAnalyzer>) -> Self {
        Self {
            root: PathBuf::from(expand_env_vars(root.as_ref())),
            analyzer,
            propagate_errors: false,
        }
    }

    /// Fail the call when a capture file cannot be written.
    pub fn propagate_errors(mut self, propagate: bool) -> Self {
        self.propagate_errors = propagate;
        self
    }

    /// Capture root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn base_file_name(&self, request: &Request, now: &DateTime<Local>) -> String {
        let call_name = sanitize(&self.analyzer.call_name(request));
        let correlation_id = correlation::current(request)
            .map(sanitize)
            .unwrap_or_else(|| now.format("%Y%m%d%H%M%S%3f").to_string());
        format!("{}_{}", call_name, correlation_id)
    }

    async fn capture(
        &self,
        dir: &Path,
        file_name: String,
        body: Option<&Bytes>,
    ) -> Result<()> {
        let Some(body) = body.filter(|b| !b.is_empty()) else {
            return Ok(());
        };

        let path = dir.join(file_name);
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, body).await
        }
        .await;

        match written {
            Ok(()) => {
                debug!(path = %path.display(), bytes = body.len(), "Captured HTTP body");
                Ok(())
            }
            Err(e) if self.propagate_errors => Err(HttpClientError::Io(e)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to capture HTTP body");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Decorator for CaptureToFile {
    async fn handle(
        &self,
        request: Request,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<Response> {
        let now = Local::now();
        let dir = self.root.join(now.format("%Y-%m-%d").to_string());
        let base = self.base_file_name(&request, &now);

        let file_name = format!("{}_req.{}", base, file_extension(request.content_type()));
        self.capture(&dir, file_name, request.body()).await?;

        let response = next.run(request, cancel).await?;

        let file_name = format!("{}_resp.{}", base, file_extension(response.content_type()));
        self.capture(&dir, file_name, Some(response.bytes())).await?;

        Ok(response)
    }
}

/// File extension for a body of `content_type`.
pub fn file_extension(content_type: Option<&str>) -> &'static str {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match media_type.as_deref() {
        Some("application/json" | "text/json") => "json",
        Some("application/xml" | "text/xml") => "xml",
        Some("application/protobuf" | "application/x-protobuf") => "pb",
        Some("application/octet-stream") => "bin",
        _ => "txt",
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Unknown variables are left untouched.
fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['$', '%']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match parse_reference(tail) {
            Some((name, consumed)) => {
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&tail[..consumed]),
                }
                rest = &tail[consumed..];
            }
            None => {
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Variable name and the number of bytes the reference spans.
fn parse_reference(tail: &str) -> Option<(&str, usize)> {
    let is_name = |name: &str| {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    if let Some(after) = tail.strip_prefix("${") {
        let end = after.find('}')?;
        let name = &after[..end];
        is_name(name).then_some((name, end + 3))
    } else if let Some(after) = tail.strip_prefix('$') {
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..len];
        is_name(name).then_some((name, len + 1))
    } else if let Some(after) = tail.strip_prefix('%') {
        let end = after.find('%')?;
        let name = &after[..end];
        is_name(name).then_some((name, end + 2))
    } else {
        None
    }
}
