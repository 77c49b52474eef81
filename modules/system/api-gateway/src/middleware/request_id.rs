//! Correlation id handling.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::request_id::{MakeRequestId, RequestId};

/// Request id extracted from `x-request-id`, available to handlers via extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRequestId(pub String);

#[must_use]
pub fn header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

/// Generates a UUID v4 request id when the client did not send one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeReqId;

impl MakeRequestId for MakeReqId {
    fn make_request_id<B>(&mut self, _req: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Non-empty `x-request-id` header value, if any.
#[must_use]
pub fn from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Record the request id into the current span and the request extensions.
pub async fn push_req_id_to_extensions(mut req: Request, next: Next) -> Response {
    if let Some(rid) = from_headers(req.headers()).map(str::to_owned) {
        tracing::Span::current().record("request_id", rid.as_str());
        req.extensions_mut().insert(XRequestId(rid));
    }
    next.run(req).await
}
