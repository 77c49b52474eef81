//! Unavailability responder.
//!
//! Produces the client-facing response when an upstream cannot be reached,
//! and counts fallbacks per service.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use serde::{Deserialize, Serialize};

use crate::middleware::request_id::{from_headers, header as request_id_header};

pub const SERVICE_UNAVAILABLE_CODE: &str = "SERVICE_UNAVAILABLE";
pub const RETRY_AFTER_SECS: u32 = 30;

/// Fallback responses served, labelled by `service`.
pub const FALLBACK_COUNT_METRIC: &str = "gateway_fallback_total";
/// Time spent on the failed dispatch before falling back, labelled by `service`.
pub const FALLBACK_LATENCY_METRIC: &str = "gateway_fallback_latency_seconds";

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        FALLBACK_COUNT_METRIC,
        Unit::Count,
        "Requests answered by the unavailability responder"
    );
    describe_histogram!(
        FALLBACK_LATENCY_METRIC,
        Unit::Seconds,
        "Duration of the failed upstream dispatch preceding a fallback"
    );
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUnavailableBody {
    pub code: String,
    pub message: String,
    pub service: String,
    /// ISO-8601 instant, UTC with millisecond precision.
    pub timestamp: String,
    pub request_id: String,
}

/// The inbound `x-request-id`, or a fresh UUID when the request has none.
#[must_use]
pub fn request_id_or_generate(headers: &HeaderMap) -> String {
    from_headers(headers).map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned)
}

/// Build the 503 response for `service`.
///
/// `elapsed` is how long the failed dispatch took.
#[must_use]
pub fn service_unavailable(
    service: &str,
    request_id: &str,
    method: &Method,
    path: &str,
    elapsed: Duration,
) -> Response {
    tracing::warn!(
        request_id,
        path,
        method = %method,
        service,
        "upstream service unavailable, returning fallback response"
    );

    counter!(FALLBACK_COUNT_METRIC, "service" => service.to_owned()).increment(1);
    histogram!(FALLBACK_LATENCY_METRIC, "service" => service.to_owned())
        .record(elapsed.as_secs_f64());

    let body = ServiceUnavailableBody {
        code: SERVICE_UNAVAILABLE_CODE.to_owned(),
        message: format!(
            "Service '{service}' is temporarily unavailable. Please try again later."
        ),
        service: service.to_owned(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        request_id: request_id.to_owned(),
    };

    let mut response = (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    match HeaderValue::from_str(request_id) {
        Ok(value) => {
            headers.insert(request_id_header(), value);
        }
        Err(_) => tracing::debug!("request id is not a valid header value, not echoed"),
    }
    response
}
