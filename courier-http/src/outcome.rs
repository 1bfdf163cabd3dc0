//! Call results returned by [`HttpClient`](crate::HttpClient).

use http::StatusCode;
use serde::Deserialize;
use std::any::Any;
use std::fmt;

/// Marker response type for calls whose body is ignored.
///
/// When requested as the response type, a successful call returns
/// `NoContent` without reading or deserializing the body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NoContent;

impl NoContent {
    /// `Some(NoContent)` when `T` is `NoContent`.
    pub(crate) fn downcast<T: 'static>() -> Option<T> {
        let boxed: Box<dyn Any> = Box::new(NoContent);
        boxed.downcast::<T>().ok().map(|value| *value)
    }
}

/// Why a call failed before producing an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Request or response body could not be (de)serialized.
    Serialization,
    /// No connection to the server could be established.
    Connection,
    /// The caller's cancellation token was cancelled.
    CancelledByCaller,
    /// The call was cancelled without the caller asking, e.g. a timeout.
    ServerTimeout,
    /// Any other failure, named by its kind.
    Uncaught(String),
}

impl FailureKind {
    /// Message reported for this kind of failure.
    pub fn message(&self) -> String {
        match self {
            FailureKind::Serialization => "Serialization (or deserialization) has failed.".to_string(),
            FailureKind::Connection => "Failed to establish connection to the server.".to_string(),
            FailureKind::CancelledByCaller => "Request has been cancelled by client.".to_string(),
            FailureKind::ServerTimeout => "Server has not responded in time.".to_string(),
            FailureKind::Uncaught(kind) => format!("Uncaught exception {}", kind),
        }
    }
}

/// A failed call together with its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human readable message.
    pub message: String,
}

impl CallFailure {
    /// Failure with the standard message of `kind`.
    pub fn new(kind: FailureKind) -> Self {
        let message = kind.message();
        Self { kind, message }
    }
}

impl From<FailureKind> for CallFailure {
    fn from(kind: FailureKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a call: a value, an HTTP error status, or a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult<T> {
    /// Success status with the deserialized body.
    Success {
        /// Response status.
        status: StatusCode,
        /// Deserialized body.
        value: T,
    },
    /// Non-success status with the raw body text.
    HttpError {
        /// Response status.
        status: StatusCode,
        /// Raw response body.
        body: String,
    },
    /// The call failed without an HTTP status.
    Failure(CallFailure),
}

impl<T> CallResult<T> {
    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success { .. })
    }

    /// Value of a successful call.
    pub fn value(&self) -> Option<&T> {
        match self {
            CallResult::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Consume the result returning the value of a successful call.
    pub fn into_value(self) -> Option<T> {
        match self {
            CallResult::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Response status, absent for failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CallResult::Success { status, .. } | CallResult::HttpError { status, .. } => {
                Some(*status)
            }
            CallResult::Failure(_) => None,
        }
    }

    /// Error text: the response body for HTTP errors, the message for failures.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            CallResult::Success { .. } => None,
            CallResult::HttpError { body, .. } => Some(body),
            CallResult::Failure(failure) => Some(&failure.message),
        }
    }

    /// Failure details, if the call failed without a status.
    pub fn failure(&self) -> Option<&CallFailure> {
        match self {
            CallResult::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    /// Map the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CallResult<U> {
        match self {
            CallResult::Success { status, value } => CallResult::Success {
                status,
                value: f(value),
            },
            CallResult::HttpError { status, body } => CallResult::HttpError { status, body },
            CallResult::Failure(failure) => CallResult::Failure(failure),
        }
    }
}

impl<T> From<CallFailure> for CallResult<T> {
    fn from(failure: CallFailure) -> Self {
        CallResult::Failure(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_content_downcast() {
        assert_eq!(NoContent::downcast::<NoContent>(), Some(NoContent));
        assert_eq!(NoContent::downcast::<String>(), None);
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            CallFailure::new(FailureKind::Connection).message,
            "Failed to establish connection to the server."
        );
        assert_eq!(
            CallFailure::new(FailureKind::Uncaught("Redirect".to_string())).message,
            "Uncaught exception Redirect"
        );
    }

    #[test]
    fn test_accessors() {
        let ok: CallResult<u32> = CallResult::Success {
            status: StatusCode::OK,
            value: 7,
        };
        let not_found: CallResult<u32> = CallResult::HttpError {
            status: StatusCode::NOT_FOUND,
            body: "missing".to_string(),
        };
        let timeout: CallResult<u32> = CallFailure::new(FailureKind::ServerTimeout).into();

        assert!(ok.is_success());
        assert_eq!(ok.value(), Some(&7));
        assert_eq!(ok.error_message(), None);
        assert_eq!(not_found.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(not_found.error_message(), Some("missing"));
        assert_eq!(timeout.status(), None);
        assert_eq!(
            timeout.error_message(),
            Some("Server has not responded in time.")
        );
        assert_eq!(ok.map(|v| v * 2).into_value(), Some(14));
    }
}
