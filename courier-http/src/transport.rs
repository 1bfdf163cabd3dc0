//! Terminal transport of the pipeline.

use async_trait::async_trait;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use parking_lot::RwLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::{Authentication, DigestChallenge, new_cnonce};
use crate::{HttpClientError, Request, Response, Result};

/// Sends a request over the wire.
///
/// Implementations classify their failures once, here: caller cancellation
/// becomes [`HttpClientError::Cancelled`], timeouts become
/// [`HttpClientError::Timeout`], refused connections become
/// [`HttpClientError::Connection`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`, aborting when `cancel` fires.
    async fn send(&self, request: Request, cancel: &CancellationToken) -> Result<Response>;

    /// Release the resources held by the transport.
    fn close(&self) {}
}

/// Settings of the default transport.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Total request timeout.
    pub timeout: Duration,
    /// Redirect limit. Redirects are only followed when this is set to a
    /// positive value; `None` and `Some(0)` return redirects as-is.
    pub max_redirects: Option<usize>,
    /// Idle time after which pooled connections are dropped.
    pub pool_idle_timeout: Option<Duration>,
    /// Authentication scheme.
    pub authentication: Option<Authentication>,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip decompression.
    pub gzip: bool,
    /// Enable brotli decompression.
    pub brotli: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_redirects: None,
            pool_idle_timeout: None,
            authentication: None,
            user_agent: format!("courier-http/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
        }
    }
}

/// Transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: RwLock<Option<reqwest::Client>>,
    authentication: Option<Authentication>,
}

impl ReqwestTransport {
    /// Build the transport.
    pub fn new(options: TransportOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(&options.user_agent)
            .gzip(options.gzip)
            .brotli(options.brotli);

        let redirect = match options.max_redirects {
            Some(max) if max > 0 => reqwest::redirect::Policy::limited(max),
            _ => reqwest::redirect::Policy::none(),
        };
        builder = builder.redirect(redirect);

        if let Some(idle) = options.pool_idle_timeout {
            builder = builder.pool_idle_timeout(idle);
        }

        let client = builder
            .build()
            .map_err(|e| HttpClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client: RwLock::new(Some(client)),
            authentication: options.authentication,
        })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            authentication: None,
        }
    }

    /// Whether [`Transport::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.client.read().is_none()
    }

    fn client(&self) -> Result<reqwest::Client> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| HttpClientError::uncaught("ObjectDisposed", "transport has been closed"))
    }

    async fn execute(
        &self,
        client: &reqwest::Client,
        request: &Request,
        authorization: Option<&str>,
    ) -> Result<Response> {
        let mut headers = request.headers().clone();
        if let Some(value) = authorization {
            let value = HeaderValue::try_from(value)
                .map_err(|e| HttpClientError::RequestBuild(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = client
            .request(request.method().clone(), request.url().clone())
            .headers(headers);
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        Response::from_reqwest(response).await
    }

    async fn send_authenticated(&self, request: &Request) -> Result<Response> {
        let client = self.client()?;

        let preemptive = match &self.authentication {
            Some(auth) if !request.headers().contains_key(AUTHORIZATION) => {
                auth.preemptive_header()
            }
            _ => None,
        };
        let response = self.execute(&client, request, preemptive.as_deref()).await?;

        let Some(Authentication::Digest { username, password }) = &self.authentication else {
            return Ok(response);
        };
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(challenge) = response
            .header(WWW_AUTHENTICATE.as_str())
            .and_then(DigestChallenge::parse)
        else {
            return Ok(response);
        };

        let url = request.url();
        let uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let Some(authorization) = challenge.respond(
            username,
            password,
            request.method().as_str(),
            &uri,
            &new_cnonce(),
        ) else {
            warn!(realm = %challenge.realm(), "Digest challenge left unanswered");
            return Ok(response);
        };

        debug!(realm = %challenge.realm(), "Answering digest challenge");
        self.execute(&client, request, Some(&authorization)).await
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request, cancel: &CancellationToken) -> Result<Response> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HttpClientError::Cancelled),
            result = self.send_authenticated(&request) => result,
        }
    }

    fn close(&self) {
        if self.client.write().take().is_some() {
            debug!("HTTP transport closed");
        }
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("closed", &self.is_closed())
            .field("authentication", &self.authentication)
            .finish()
    }
}

/// Map a reqwest error onto the client error taxonomy.
pub(crate) fn classify_reqwest_error(e: reqwest::Error) -> HttpClientError {
    if e.is_timeout() {
        HttpClientError::Timeout(e.to_string())
    } else if e.is_connect() {
        HttpClientError::Connection(e.to_string())
    } else if e.is_builder() {
        HttpClientError::RequestBuild(e.to_string())
    } else {
        let kind = if e.is_redirect() {
            "Redirect"
        } else if e.is_body() {
            "Body"
        } else if e.is_decode() {
            "Decode"
        } else if e.is_request() {
            "Request"
        } else {
            "Http"
        };
        HttpClientError::uncaught(kind, e.to_string())
    }
}
