//! Exception-raising client façade.

use http::Method;
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use crate::client::HttpClient;
use crate::exception::HttpException;
use crate::outcome::{FailureKind, NoContent};
use crate::{JsonSerialization, Pipeline, PipelineBuilder, Response, Result, Serialization};

/// HTTP client returning the deserialized value or an [`HttpException`].
///
/// Every non-success outcome becomes an exception carrying the status and
/// raw body when there is one. An `HttpException` raised inside the
/// pipeline is passed through unchanged.
#[derive(Debug)]
pub struct ThrowingHttpClient<S: Serialization = JsonSerialization> {
    inner: HttpClient<S>,
}

impl ThrowingHttpClient<JsonSerialization> {
    /// JSON client over a default pipeline for `base_address`.
    pub fn with_base_address(base_address: impl Into<String>) -> Result<Self> {
        Ok(Self::from(HttpClient::with_base_address(base_address)?))
    }
}

impl<S: Serialization> ThrowingHttpClient<S> {
    /// Client owning `pipeline`'s transport.
    pub fn new(pipeline: Pipeline, serialization: S) -> Self {
        Self::from(HttpClient::new(pipeline, serialization))
    }

    /// Client over a pipeline built from `builder`.
    pub fn from_builder(builder: &mut PipelineBuilder, serialization: S) -> Result<Self> {
        HttpClient::from_builder(builder, serialization).map(Self::from)
    }

    /// Client sharing `pipeline` with others.
    pub fn shared(pipeline: Pipeline, serialization: S) -> Self {
        Self::from(HttpClient::shared(pipeline, serialization))
    }

    /// Query parameter appended to every request of this client.
    pub fn with_default_query_param(
        self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::from(self.inner.with_default_query_param(key, value))
    }

    /// The wrapped result-object client.
    pub fn inner(&self) -> &HttpClient<S> {
        &self.inner
    }

    /// Send a request without body, `GET` unless `method` says otherwise.
    pub async fn send<T>(
        &self,
        endpoint: &str,
        method: Option<Method>,
        cancel: &CancellationToken,
    ) -> std::result::Result<T, HttpException>
    where
        T: DeserializeOwned + 'static,
    {
        let request = self
            .inner
            .prepare(endpoint, method.unwrap_or(Method::GET), None)?;
        let response = self.inner.exchange(request, cancel).await?;
        self.interpret(response)
    }

    /// Send a serialized body, `POST` unless `method` says otherwise.
    pub async fn send_with<B, T>(
        &self,
        endpoint: &str,
        body: &B,
        method: Option<Method>,
        cancel: &CancellationToken,
    ) -> std::result::Result<T, HttpException>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + 'static,
    {
        let body = self
            .inner
            .serialization()
            .serialize(body)
            .map_err(|_| HttpException::from_failure(FailureKind::Serialization))?;
        let request = self
            .inner
            .prepare(endpoint, method.unwrap_or(Method::POST), Some(body))?;
        let response = self.inner.exchange(request, cancel).await?;
        self.interpret(response)
    }

    /// Release the transport if this client owns it. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    fn interpret<T>(&self, response: Response) -> std::result::Result<T, HttpException>
    where
        T: DeserializeOwned + 'static,
    {
        let status = response.status();
        if !response.is_success() {
            return Err(HttpException::from_status(status, Some(response.into_bytes())));
        }

        if let Some(value) = NoContent::downcast::<T>() {
            return Ok(value);
        }

        if response.bytes().is_empty() {
            return Err(HttpException::from_status(status, None));
        }

        match self.inner.serialization().deserialize::<T>(response.bytes()) {
            Ok(value) => Ok(value),
            Err(_) => Err(HttpException::from_status(status, Some(response.into_bytes()))),
        }
    }
}

impl<S: Serialization> From<HttpClient<S>> for ThrowingHttpClient<S> {
    fn from(inner: HttpClient<S>) -> Self {
        Self { inner }
    }
}
