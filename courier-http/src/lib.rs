//! # Courier HTTP
//!
//! Outbound HTTP calls through a decorated pipeline, with correlation ids,
//! metrics, retry and circuit breaking.
//!
//! ## Features
//!
//! - **Pipeline**: decorators composed once around a transport
//! - **Two Façades**: [`HttpClient`] returns a [`CallResult`], [`ThrowingHttpClient`]
//!   returns the value or an [`HttpException`]
//! - **Decorators**: metrics and logging, debug dump, capture to file, retry,
//!   circuit breaker
//! - **Authentication**: basic, bearer and digest (MD5, MD5-sess, SHA-256)
//! - **Correlation**: `X-CorrelationId` minted once per call and kept across retries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier_http::decorators::{MetricsAndLogging, RetryDecorator};
//! use courier_http::{CallResult, DefaultCallAnalyzer, HttpClient, JsonSerialization,
//!     NoopMetrics, PipelineBuilder};
//! use serde::Deserialize;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Deserialize)]
//! struct Post {
//!     title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut builder = PipelineBuilder::new();
//!     builder
//!         .base_address("https://jsonplaceholder.typicode.com/")
//!         .timeout(Duration::from_secs(5))
//!         .with(MetricsAndLogging::new(DefaultCallAnalyzer::new("jsonplaceholder"), NoopMetrics))
//!         .with(RetryDecorator::with_intervals(&[100, 200, 400]));
//!
//!     let client = HttpClient::from_builder(&mut builder, JsonSerialization)?;
//!     let cancel = CancellationToken::new();
//!
//!     if let CallResult::Success { value, .. } = client.send::<Post>("posts/1", None, &cancel).await? {
//!         println!("{}", value.title);
//!     }
//!     Ok(())
//! }
//! ```

mod analyzer;
mod auth;
mod builder;
mod client;
mod client_exceptions;
pub mod correlation;
pub mod decorators;
mod error;
mod exception;
pub mod metrics;
mod outcome;
mod pipeline;
mod request;
mod response;
mod serialization;
mod settings;
mod transport;

pub use analyzer::{CallAnalyzer, DefaultCallAnalyzer};
pub use auth::{Authentication, DigestChallenge};
pub use builder::{NO_CACHE, PipelineBuilder};
pub use client::HttpClient;
pub use client_exceptions::ThrowingHttpClient;
pub use correlation::{CORRELATION_ID_HEADER, CORRELATION_ID_PROPERTY};
pub use error::{HttpClientError, Result};
pub use exception::HttpException;
pub use metrics::{InMemoryMetrics, MetricsRecorder, NoopMetrics, PrometheusMetrics};
pub use outcome::{CallFailure, CallResult, FailureKind, NoContent};
pub use pipeline::{Decorator, Next, Pipeline};
pub use request::{Request, resolve_url};
pub use response::Response;
pub use serialization::{JsonSerialization, Serialization};
pub use settings::ClientSettings;
pub use transport::{ReqwestTransport, Transport, TransportOptions};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use courier_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::analyzer::{CallAnalyzer, DefaultCallAnalyzer};
    pub use crate::builder::PipelineBuilder;
    pub use crate::client::HttpClient;
    pub use crate::client_exceptions::ThrowingHttpClient;
    pub use crate::decorators::{
        CaptureToFile, CircuitBreakerDecorator, DebugDump, MetricsAndLogging, RetryDecorator,
    };
    pub use crate::error::{HttpClientError, Result};
    pub use crate::exception::HttpException;
    pub use crate::outcome::{CallResult, FailureKind, NoContent};
    pub use crate::pipeline::{Decorator, Next, Pipeline};
    pub use crate::request::Request;
    pub use crate::response::Response;
    pub use crate::serialization::{JsonSerialization, Serialization};
    pub use http::{Method, StatusCode};
    pub use tokio_util::sync::CancellationToken;
}
