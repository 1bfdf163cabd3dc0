//! Decorator chain composed by [`PipelineBuilder`](crate::PipelineBuilder).
//!
//! Decorators run in the order they were added for the outbound request and
//! in reverse order for the inbound response. The transport terminates the
//! chain.

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::request::resolve_url;
use crate::transport::Transport;
use crate::{Request, Response, Result};

/// Cross-cutting stage wrapping the rest of the chain.
///
/// ```
/// use async_trait::async_trait;
/// use courier_http::{
///     CancellationToken, Decorator, Next, PipelineBuilder, Request, Response, Result,
///     StatusCode, Transport,
/// };
///
/// struct Tag;
///
/// #[async_trait]
/// impl Decorator for Tag {
///     async fn handle(&self, request: Request, cancel: &CancellationToken, next: Next<'_>) -> Result<Response> {
///         let request = request.with_header("X-Tag", "courier")?;
///         next.run(request, cancel).await
///     }
/// }
///
/// struct Echo;
///
/// #[async_trait]
/// impl Transport for Echo {
///     async fn send(&self, request: Request, _cancel: &CancellationToken) -> Result<Response> {
///         let tag = request.header("X-Tag").unwrap_or_default().to_string();
///         Ok(Response::new(StatusCode::OK, tag))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let pipeline = PipelineBuilder::new().transport(Echo).with(Tag).build().unwrap();
/// let request = Request::get("https://api.example.test/").unwrap();
///
/// let response = pipeline.send(request, &CancellationToken::new()).await.unwrap();
/// assert_eq!(response.text().unwrap(), "courier");
/// # });
/// ```
#[async_trait]
pub trait Decorator: Send + Sync {
    /// Handle `request`, usually by delegating to `next`.
    async fn handle(
        &self,
        request: Request,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> Result<Response>;
}

/// Remainder of the chain after the current decorator.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    decorators: &'a [Arc<dyn Decorator>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub(crate) fn new(decorators: &'a [Arc<dyn Decorator>], transport: &'a dyn Transport) -> Self {
        Self {
            decorators,
            transport,
        }
    }

    /// Run the rest of the chain. May be called more than once.
    pub async fn run(self, request: Request, cancel: &CancellationToken) -> Result<Response> {
        match self.decorators.split_first() {
            Some((current, rest)) => {
                current
                    .handle(request, cancel, Next::new(rest, self.transport))
                    .await
            }
            None => self.transport.send(request, cancel).await,
        }
    }
}

/// Scalar settings applied to every request of a pipeline.
#[derive(Debug, Clone, Default)]
pub(crate) struct PipelineSettings {
    pub(crate) base_address: Option<Url>,
    pub(crate) default_headers: HeaderMap,
    pub(crate) query_params: Vec<(String, String)>,
}

/// Immutable chain of decorators ending in a transport.
///
/// Cloning shares the chain and the transport.
#[derive(Clone)]
pub struct Pipeline {
    decorators: Arc<[Arc<dyn Decorator>]>,
    transport: Arc<dyn Transport>,
    settings: Arc<PipelineSettings>,
}

impl Pipeline {
    pub(crate) fn new(
        decorators: Vec<Arc<dyn Decorator>>,
        transport: Arc<dyn Transport>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            decorators: decorators.into(),
            transport,
            settings: Arc::new(settings),
        }
    }

    /// Base address relative endpoints are resolved against.
    pub fn base_address(&self) -> Option<&Url> {
        self.settings.base_address.as_ref()
    }

    /// Resolve an endpoint against the base address.
    pub fn resolve(&self, endpoint: &str) -> Result<Url> {
        resolve_url(self.base_address(), endpoint)
    }

    /// Number of decorators in the chain.
    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    /// Whether the chain has no decorators.
    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }

    /// Terminal transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Dispatch a request through the chain.
    ///
    /// Default headers are added when the request does not carry them, and
    /// default query parameters are appended.
    pub async fn send(&self, mut request: Request, cancel: &CancellationToken) -> Result<Response> {
        for (name, value) in self.settings.default_headers.iter() {
            if !request.headers().contains_key(name) {
                request.headers_mut().insert(name.clone(), HeaderValue::clone(value));
            }
        }
        for (key, value) in &self.settings.query_params {
            request.append_query_param(key, value);
        }

        Next::new(&self.decorators, self.transport.as_ref())
            .run(request, cancel)
            .await
    }

    /// Close the terminal transport.
    pub fn close(&self) {
        self.transport.close();
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("decorators", &self.decorators.len())
            .field("base_address", &self.settings.base_address)
            .finish_non_exhaustive()
    }
}
