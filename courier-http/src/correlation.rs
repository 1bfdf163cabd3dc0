//! Correlation id propagation.

use crate::request::Request;
use uuid::Uuid;

/// Header carrying the correlation id.
pub const CORRELATION_ID_HEADER: &str = "X-CorrelationId";

/// Request property carrying the correlation id.
pub const CORRELATION_ID_PROPERTY: &str = "CorrelationId";

/// Where a resolved correlation id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSource {
    /// Already present as a header.
    Header,
    /// Taken from the property bag.
    Property,
    /// Freshly minted.
    Generated,
}

/// Resolve the correlation id of `request`: header first, then property,
/// otherwise a new UUID v4.
pub fn resolve(request: &Request) -> (String, CorrelationSource) {
    if let Some(id) = request.header_correlation_id() {
        return (id.to_string(), CorrelationSource::Header);
    }
    if let Some(id) = request.property_correlation_id() {
        return (id.to_string(), CorrelationSource::Property);
    }
    (Uuid::new_v4().to_string(), CorrelationSource::Generated)
}

/// Resolve the correlation id and attach it as a header when missing.
pub fn ensure(request: &mut Request) -> crate::Result<String> {
    let (id, source) = resolve(request);
    if source != CorrelationSource::Header {
        request.set_header(CORRELATION_ID_HEADER, &id)?;
    }
    Ok(id)
}

/// Correlation id already carried by the request, without minting one.
pub fn current(request: &Request) -> Option<&str> {
    request
        .header_correlation_id()
        .or_else(|| request.property_correlation_id())
}
