//! Exception type raised by [`ThrowingHttpClient`](crate::ThrowingHttpClient).

use crate::error::HttpClientError;
use crate::outcome::FailureKind;
use bytes::Bytes;
use http::StatusCode;
use std::fmt;

/// A failed call: either a non-success status with its body, or a failure
/// that produced no status.
#[derive(Debug, Clone)]
pub struct HttpException {
    status: Option<StatusCode>,
    message: String,
    body: Option<Bytes>,
    kind: Option<FailureKind>,
}

impl HttpException {
    /// Exception for a response status and its raw body.
    pub fn from_status(status: StatusCode, body: Option<Bytes>) -> Self {
        Self {
            status: Some(status),
            message: format!("HTTP call failed with status {}", status),
            body: body.filter(|b| !b.is_empty()),
            kind: None,
        }
    }

    /// Exception for a failure without a status.
    pub fn from_failure(kind: FailureKind) -> Self {
        Self {
            status: None,
            message: kind.message(),
            body: None,
            kind: Some(kind),
        }
    }

    /// Exception with a custom message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            body: None,
            kind: None,
        }
    }

    /// Attach a status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Response status, if the call produced one.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Exception message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw response body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Response body as text, lossily decoded.
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Failure classification when no status was produced.
    pub fn kind(&self) -> Option<&FailureKind> {
        self.kind.as_ref()
    }
}

impl fmt::Display for HttpException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpException {}

impl From<HttpClientError> for HttpException {
    fn from(e: HttpClientError) -> Self {
        match e {
            HttpClientError::Exception(inner) => inner,
            other => {
                let message = other.to_string();
                match other.into_failure() {
                    Ok(failure) => HttpException::from_failure(failure.kind),
                    Err(_) => HttpException::new(message),
                }
            }
        }
    }
}
