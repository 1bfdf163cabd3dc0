//! Fluent pipeline builder.

use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::auth::Authentication;
use crate::pipeline::{Decorator, Pipeline, PipelineSettings};
use crate::transport::{ReqwestTransport, Transport, TransportOptions};
use crate::{HttpClientError, Result};

/// Value of `Cache-Control` sent by [`PipelineBuilder::no_cache`].
pub const NO_CACHE: &str = "no-cache, private";

/// Builder of [`Pipeline`]s.
///
/// [`build`](Self::build) consumes the decorators and the transport override
/// but keeps the scalar settings, so one builder can produce several
/// pipelines sharing their configuration.
pub struct PipelineBuilder {
    base_address: Option<String>,
    options: TransportOptions,
    no_cache: bool,
    default_headers: Vec<(String, String)>,
    query_params: Vec<(String, String)>,
    transport: Option<Arc<dyn Transport>>,
    decorators: Vec<Arc<dyn Decorator>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            base_address: None,
            options: TransportOptions::default(),
            no_cache: false,
            default_headers: Vec::new(),
            query_params: Vec::new(),
            transport: None,
            decorators: Vec::new(),
        }
    }
}

impl PipelineBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Base address relative endpoints are resolved against.
    pub fn base_address(&mut self, url: impl Into<String>) -> &mut Self {
        self.base_address = Some(url.into());
        self
    }

    /// Base address with a connection lease: pooled connections idle for
    /// longer than `lease` are dropped.
    pub fn base_address_with_lease(&mut self, url: impl Into<String>, lease: Duration) -> &mut Self {
        self.options.pool_idle_timeout = Some(lease);
        self.base_address(url)
    }

    /// Request timeout, 10 seconds by default.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.options.timeout = timeout;
        self
    }

    /// Maximum redirects followed. Redirects are not followed unless this is
    /// set to a positive value.
    pub fn max_redirects(&mut self, max: usize) -> &mut Self {
        self.options.max_redirects = Some(max);
        self
    }

    /// Do not follow redirects.
    pub fn disable_redirects(&mut self) -> &mut Self {
        self.options.max_redirects = Some(0);
        self
    }

    /// Use basic authentication.
    pub fn basic_authentication(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.options.authentication = Some(Authentication::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Use digest authentication.
    pub fn digest_authentication(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.options.authentication = Some(Authentication::Digest {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Use a bearer token.
    pub fn bearer_authentication(&mut self, token: impl Into<String>) -> &mut Self {
        self.options.authentication = Some(Authentication::Bearer(token.into()));
        self
    }

    /// Send `Cache-Control: no-cache, private`.
    pub fn no_cache(&mut self) -> &mut Self {
        self.no_cache = true;
        self
    }

    /// Header added to requests that do not carry it.
    pub fn default_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Query parameter appended to every request.
    pub fn default_query_param(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// User agent of the default transport.
    pub fn user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
        self.options.user_agent = user_agent.into();
        self
    }

    /// Replace the default reqwest transport.
    pub fn transport(&mut self, transport: impl Transport + 'static) -> &mut Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Replace the default transport with a shared one.
    pub fn shared_transport(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        self.transport = Some(transport);
        self
    }

    /// Append a decorator.
    pub fn with(&mut self, decorator: impl Decorator + 'static) -> &mut Self {
        self.decorators.push(Arc::new(decorator));
        self
    }

    /// Append a shared decorator. Adding the same instance twice is a no-op.
    pub fn with_shared(&mut self, decorator: Arc<dyn Decorator>) -> &mut Self {
        let duplicate = self
            .decorators
            .iter()
            .any(|d| std::ptr::addr_eq(Arc::as_ptr(d), Arc::as_ptr(&decorator)));
        if !duplicate {
            self.decorators.push(decorator);
        }
        self
    }

    /// Number of decorators queued for the next build.
    pub fn decorator_count(&self) -> usize {
        self.decorators.len()
    }

    /// Compose the pipeline.
    pub fn build(&mut self) -> Result<Pipeline> {
        let base_address = self
            .base_address
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| HttpClientError::InvalidUrl(format!("base address: {}", e)))?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| HttpClientError::RequestBuild(format!("header '{}': {}", name, e)))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| HttpClientError::RequestBuild(format!("header '{}': {}", name, e)))?;
            default_headers.insert(name, value);
        }
        if self.no_cache {
            default_headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        }

        let transport = match self.transport.take() {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.options.clone())?),
        };
        let decorators = std::mem::take(&mut self.decorators);

        Ok(Pipeline::new(
            decorators,
            transport,
            PipelineSettings {
                base_address,
                default_headers,
                query_params: self.query_params.clone(),
            },
        ))
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("base_address", &self.base_address)
            .field("options", &self.options)
            .field("no_cache", &self.no_cache)
            .field("decorators", &self.decorators.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Next;
    use crate::{Request, Response};
    use async_trait::async_trait;
    use http::StatusCode;
    use tokio_util::sync::CancellationToken;

    struct Passthrough;

    #[async_trait]
    impl Decorator for Passthrough {
        async fn handle(
            &self,
            request: Request,
            cancel: &CancellationToken,
            next: Next<'_>,
        ) -> Result<Response> {
            next.run(request, cancel).await
        }
    }

    struct HeaderEcho;

    #[async_trait]
    impl Transport for HeaderEcho {
        async fn send(&self, request: Request, _cancel: &CancellationToken) -> Result<Response> {
            let cache = request.header("cache-control").unwrap_or_default().to_string();
            Ok(Response::new(StatusCode::OK, cache))
        }
    }

    #[test]
    fn test_duplicate_shared_decorator_is_ignored() {
        let shared: Arc<dyn Decorator> = Arc::new(Passthrough);
        let mut builder = PipelineBuilder::new();
        builder
            .with_shared(shared.clone())
            .with_shared(shared)
            .with(Passthrough);

        assert_eq!(builder.decorator_count(), 2);
    }

    #[test]
    fn test_build_consumes_decorators_keeps_settings() {
        let mut builder = PipelineBuilder::new();
        builder
            .base_address("https://api.example.test/v1/")
            .transport(HeaderEcho)
            .with(Passthrough);

        let first = builder.build().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(builder.decorator_count(), 0);

        let second = builder.build().unwrap();
        assert!(second.is_empty());
        assert_eq!(second.base_address(), first.base_address());
    }

    #[test]
    fn test_invalid_base_address() {
        let err = PipelineBuilder::new()
            .base_address("not a url")
            .transport(HeaderEcho)
            .build()
            .unwrap_err();

        assert!(matches!(err, HttpClientError::InvalidUrl(_)));
    }

    #[test]
    fn test_last_authentication_wins() {
        let mut builder = PipelineBuilder::new();
        builder
            .basic_authentication("user", "pass")
            .bearer_authentication("token");

        assert_eq!(
            builder.options.authentication,
            Some(Authentication::Bearer("token".to_string()))
        );
    }

    #[tokio::test]
    async fn test_no_cache_header() {
        let pipeline = PipelineBuilder::new()
            .no_cache()
            .transport(HeaderEcho)
            .build()
            .unwrap();

        let request = Request::get("https://api.example.test/").unwrap();
        let response = pipeline.send(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(response.text().unwrap(), NO_CACHE);
    }
}
