//! HTTP client error types.

use crate::exception::HttpException;
use crate::outcome::{CallFailure, FailureKind};
use chrono::{DateTime, Utc};
use courier_core::resilience::{CircuitBreakerError, Classify, FailedAttempt, RetryError};
use std::borrow::Cow;
use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Request or response body could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No connection to the server could be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The caller's cancellation token was cancelled.
    #[error("Request cancelled by caller")]
    Cancelled,

    /// The server did not answer in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Any other transport failure.
    #[error("{kind} error: {message}")]
    Uncaught {
        /// Short name of the failure.
        kind: String,
        /// Error message.
        message: String,
    },

    /// Invalid URL or endpoint.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request building error.
    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// Invalid client settings.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Retry intervals were exhausted.
    #[error("Action has failed despite retries (using {description}), {} attempts", .attempts.len())]
    RetryExhausted {
        /// Description of the interval strategy.
        description: String,
        /// Every failed attempt, oldest first.
        attempts: Vec<FailedAttempt<HttpClientError>>,
    },

    /// Retry deadline passed.
    #[error("Action has failed despite retries. It has reached the deadline {deadline} first. Retry process has started at {started}.")]
    RetryDeadlineReached {
        /// When retrying started.
        started: DateTime<Utc>,
        /// The deadline that was reached.
        deadline: DateTime<Utc>,
    },

    /// Circuit breaker is not closed, request rejected.
    #[error("Circuit breaker '{name}' is open")]
    CircuitOpen {
        /// Breaker name.
        name: String,
        /// Message of the failure that last tripped the breaker.
        last_failure: Option<String>,
    },

    /// Exception raised inside the pipeline.
    #[error(transparent)]
    Exception(#[from] HttpException),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpClientError {
    /// Build an uncaught error.
    pub fn uncaught(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Uncaught {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Uncaught { .. } | Self::Io(_)
        )
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if the caller cancelled the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Get the HTTP status code carried by an exception.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Exception(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short name of the error kind.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Serialization(_) => "Serialization",
            Self::Connection(_) => "Connection",
            Self::Cancelled => "Cancelled",
            Self::Timeout(_) => "Timeout",
            Self::Uncaught { kind, .. } => kind,
            Self::InvalidUrl(_) => "InvalidUrl",
            Self::RequestBuild(_) => "RequestBuild",
            Self::Configuration(_) => "Configuration",
            Self::RetryExhausted { .. } => "RetryExhausted",
            Self::RetryDeadlineReached { .. } => "RetryDeadlineReached",
            Self::CircuitOpen { .. } => "CircuitOpen",
            Self::Exception(_) => "HttpException",
            Self::Io(_) => "Io",
        }
    }

    /// Classify the error as a call failure.
    ///
    /// Contract violations and resilience exhaustion are handed back as
    /// `Err` since they are not call outcomes.
    pub fn into_failure(self) -> std::result::Result<CallFailure, HttpClientError> {
        let kind = match self {
            Self::Serialization(_) => FailureKind::Serialization,
            Self::Connection(_) => FailureKind::Connection,
            Self::Cancelled => FailureKind::CancelledByCaller,
            Self::Timeout(_) => FailureKind::ServerTimeout,
            Self::Uncaught { kind, .. } => FailureKind::Uncaught(kind),
            Self::Exception(_) => FailureKind::Uncaught("HttpException".to_string()),
            Self::Io(_) => FailureKind::Uncaught("Io".to_string()),
            other => return Err(other),
        };
        Ok(CallFailure::new(kind))
    }
}

impl Classify for HttpClientError {
    fn kind(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.kind_name())
    }

    fn is_caller_cancellation(&self) -> bool {
        self.is_cancelled()
    }
}

impl From<url::ParseError> for HttpClientError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}

impl From<RetryError<HttpClientError>> for HttpClientError {
    fn from(e: RetryError<HttpClientError>) -> Self {
        match e {
            RetryError::Exhausted {
                description,
                attempts,
            } => Self::RetryExhausted {
                description,
                attempts,
            },
            RetryError::DeadlineReached { started, deadline } => {
                Self::RetryDeadlineReached { started, deadline }
            }
            RetryError::Cancelled => Self::Cancelled,
            RetryError::Aborted(e) => e,
        }
    }
}

impl From<CircuitBreakerError<HttpClientError>> for HttpClientError {
    fn from(e: CircuitBreakerError<HttpClientError>) -> Self {
        match e {
            CircuitBreakerError::Open { name, last_failure } => {
                Self::CircuitOpen { name, last_failure }
            }
            CircuitBreakerError::Failed(e) => e,
        }
    }
}
