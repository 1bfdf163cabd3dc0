//! Request descriptor travelling through the pipeline.

use crate::correlation::{CORRELATION_ID_HEADER, CORRELATION_ID_PROPERTY};
use crate::{HttpClientError, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::collections::BTreeMap;
use url::Url;

/// Outbound request.
///
/// Cloning is cheap: the body is reference counted, so retrying decorators
/// replay the same request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    properties: BTreeMap<String, String>,
}

impl Request {
    /// Create a request without body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            properties: BTreeMap::new(),
        }
    }

    /// Create a GET request for an absolute URL.
    pub fn get(url: &str) -> Result<Self> {
        Ok(Self::new(Method::GET, Url::parse(url)?))
    }

    /// Create a POST request for an absolute URL.
    pub fn post(url: &str) -> Result<Self> {
        Ok(Self::new(Method::POST, Url::parse(url)?))
    }

    /// Add a header, replacing any previous value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Set the body and its content type.
    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: &str) -> Result<Self> {
        self.body = Some(body.into());
        self.set_header(http::header::CONTENT_TYPE.as_str(), content_type)?;
        Ok(self)
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the correlation id carried in the property bag.
    pub fn with_correlation_id(self, id: impl Into<String>) -> Self {
        self.with_property(CORRELATION_ID_PROPERTY, id)
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Mutable target URL.
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::try_from(name)
            .map_err(|e| HttpClientError::RequestBuild(format!("header name '{}': {}", name, e)))?;
        let value = HeaderValue::try_from(value)
            .map_err(|e| HttpClientError::RequestBuild(format!("header '{}': {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Request body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Content type of the body.
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }

    /// Property bag.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Get a property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Non-empty correlation id from the headers.
    pub fn header_correlation_id(&self) -> Option<&str> {
        self.header(CORRELATION_ID_HEADER).filter(|v| !v.is_empty())
    }

    /// Non-empty correlation id from the property bag.
    pub fn property_correlation_id(&self) -> Option<&str> {
        self.property(CORRELATION_ID_PROPERTY).filter(|v| !v.is_empty())
    }

    /// Append a query parameter.
    pub fn append_query_param(&mut self, key: &str, value: &str) {
        self.url.query_pairs_mut().append_pair(key, value);
    }
}

/// Resolve an endpoint against an optional base address.
///
/// Absolute endpoints are used as-is. Relative endpoints follow URL
/// reference resolution, so a base path without trailing slash has its last
/// segment replaced.
pub fn resolve_url(base: Option<&Url>, endpoint: &str) -> Result<Url> {
    match Url::parse(endpoint) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => Ok(base.join(endpoint)?),
            None => Err(HttpClientError::InvalidUrl(format!(
                "relative endpoint '{}' requires a base address",
                endpoint
            ))),
        },
        Err(e) => Err(HttpClientError::InvalidUrl(format!("{}: {}", endpoint, e))),
    }
}
