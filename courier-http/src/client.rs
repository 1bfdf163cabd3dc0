//! Result-object client façade.

use bytes::Bytes;
use http::Method;
use http::header::ACCEPT;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::outcome::{CallResult, NoContent};
use crate::{
    HttpClientError, JsonSerialization, Pipeline, PipelineBuilder, Request, Response, Result,
    Serialization,
};

/// HTTP client returning every call outcome as a [`CallResult`].
///
/// `Err` is reserved for calls that could not be attempted (invalid
/// endpoint) and for exhausted resilience policies (retry exhausted, retry
/// deadline reached, circuit open).
///
/// ```no_run
/// use courier_http::{CallResult, HttpClient};
/// use serde::Deserialize;
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Deserialize)]
/// struct Post {
///     id: u32,
/// }
///
/// # async fn run() -> courier_http::Result<()> {
/// let client = HttpClient::with_base_address("https://jsonplaceholder.typicode.com/")?;
/// match client.send::<Post>("posts/1", None, &CancellationToken::new()).await? {
///     CallResult::Success { value, .. } => println!("post {}", value.id),
///     other => println!("failed: {:?}", other.error_message()),
/// }
/// # Ok(())
/// # }
/// ```
pub struct HttpClient<S: Serialization = JsonSerialization> {
    pipeline: Pipeline,
    serialization: S,
    query_params: Vec<(String, String)>,
    owns_transport: bool,
    disposed: AtomicBool,
}

impl HttpClient<JsonSerialization> {
    /// JSON client over a default pipeline for `base_address`.
    pub fn with_base_address(base_address: impl Into<String>) -> Result<Self> {
        Self::from_builder(
            PipelineBuilder::new().base_address(base_address),
            JsonSerialization,
        )
    }
}

impl<S: Serialization> HttpClient<S> {
    /// Client owning `pipeline`'s transport.
    pub fn new(pipeline: Pipeline, serialization: S) -> Self {
        Self::create(pipeline, serialization, true)
    }

    /// Client over a pipeline built from `builder`.
    pub fn from_builder(builder: &mut PipelineBuilder, serialization: S) -> Result<Self> {
        Ok(Self::new(builder.build()?, serialization))
    }

    /// Client sharing `pipeline` with others; disposing it leaves the
    /// transport open.
    pub fn shared(pipeline: Pipeline, serialization: S) -> Self {
        Self::create(pipeline, serialization, false)
    }

    fn create(pipeline: Pipeline, serialization: S, owns_transport: bool) -> Self {
        Self {
            pipeline,
            serialization,
            query_params: Vec::new(),
            owns_transport,
            disposed: AtomicBool::new(false),
        }
    }

    /// Query parameter appended to every request of this client.
    pub fn with_default_query_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The body serializer.
    pub fn serialization(&self) -> &S {
        &self.serialization
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Send a request without body, `GET` unless `method` says otherwise.
    pub async fn send<T>(
        &self,
        endpoint: &str,
        method: Option<Method>,
        cancel: &CancellationToken,
    ) -> Result<CallResult<T>>
    where
        T: DeserializeOwned + 'static,
    {
        let request = self.prepare(endpoint, method.unwrap_or(Method::GET), None)?;
        let outcome = self.exchange(request, cancel).await;
        self.interpret(outcome)
    }

    /// Send a serialized body, `POST` unless `method` says otherwise.
    pub async fn send_with<B, T>(
        &self,
        endpoint: &str,
        body: &B,
        method: Option<Method>,
        cancel: &CancellationToken,
    ) -> Result<CallResult<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + 'static,
    {
        let body = match self.serialization.serialize(body) {
            Ok(body) => body,
            Err(e) => return e.into_failure().map(CallResult::Failure),
        };
        let request = self.prepare(endpoint, method.unwrap_or(Method::POST), Some(body))?;
        let outcome = self.exchange(request, cancel).await;
        self.interpret(outcome)
    }

    /// Release the transport if this client owns it. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.owns_transport {
            self.pipeline.close();
            debug!("HTTP client disposed");
        }
    }

    pub(crate) fn prepare(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Bytes>,
    ) -> Result<Request> {
        let url = self.pipeline.resolve(endpoint)?;
        let content_type = self.serialization.content_type();

        let mut request = Request::new(method, url);
        request.set_header(ACCEPT.as_str(), content_type)?;
        if let Some(body) = body {
            request = request.with_body(body, content_type)?;
        }
        for (key, value) in &self.query_params {
            request.append_query_param(key, value);
        }
        Ok(request)
    }

    pub(crate) async fn exchange(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        if self.is_disposed() {
            return Err(HttpClientError::uncaught(
                "ObjectDisposed",
                "HTTP client has been disposed",
            ));
        }
        self.pipeline.send(request, cancel).await
    }

    fn interpret<T>(&self, outcome: Result<Response>) -> Result<CallResult<T>>
    where
        T: DeserializeOwned + 'static,
    {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => return e.into_failure().map(CallResult::Failure),
        };

        let status = response.status();
        if !response.is_success() {
            return Ok(CallResult::HttpError {
                status,
                body: response.text_lossy(),
            });
        }

        if let Some(value) = NoContent::downcast::<T>() {
            return Ok(CallResult::Success { status, value });
        }

        match self.serialization.deserialize::<T>(response.bytes()) {
            Ok(value) => Ok(CallResult::Success { status, value }),
            Err(e) => e.into_failure().map(CallResult::Failure),
        }
    }
}

impl<S: Serialization> Drop for HttpClient<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<S: Serialization> std::fmt::Debug for HttpClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("pipeline", &self.pipeline)
            .field("content_type", &self.serialization.content_type())
            .field("owns_transport", &self.owns_transport)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
