//! Ordered request pipeline.
//!
//! The stages are data: [`PIPELINE`] lists them outermost first and
//! [`apply`] layers them in reverse, because the last `Router::layer` call
//! becomes the outermost layer and runs first on the request path.

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

use crate::auth::{self, GatewayRoutePolicy};
use crate::middleware::identity_propagation::{self, IdentityPropagation};
use crate::middleware::path_validation;
use crate::middleware::request_id;
use crate::middleware::security_context::{self, SecurityContextLoader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Generate `x-request-id` when absent.
    SetRequestId,
    /// Echo `x-request-id` on the response.
    PropagateRequestId,
    /// One `http_request` span per request.
    Trace,
    /// Record the request id into the span and request extensions.
    RecordRequestId,
    /// Refuse paths an upstream could normalize to a different resource.
    RejectAmbiguousPath,
    /// Compute the request's `AuthOutcome`.
    LoadSecurityContext,
    /// Refuse protected routes without an authenticated identity.
    AuthorizeRoute,
    /// Inject `X-User-*` headers for the upstream.
    PropagateIdentity,
}

/// Request execution order, outermost first.
pub const PIPELINE: [Stage; 8] = [
    Stage::SetRequestId,
    Stage::PropagateRequestId,
    Stage::Trace,
    Stage::RecordRequestId,
    Stage::RejectAmbiguousPath,
    Stage::LoadSecurityContext,
    Stage::AuthorizeRoute,
    Stage::PropagateIdentity,
];

/// Shared state the authentication stages need.
#[derive(Clone)]
pub struct PipelineState {
    pub loader: SecurityContextLoader,
    pub route_policy: GatewayRoutePolicy,
    pub propagation: IdentityPropagation,
}

/// Wrap `router` in `stages`, first entry outermost.
#[must_use]
pub fn apply(router: Router, stages: &[Stage], state: &PipelineState) -> Router {
    stages
        .iter()
        .rev()
        .fold(router, |router, stage| apply_stage(router, *stage, state))
}

fn apply_stage(router: Router, stage: Stage, state: &PipelineState) -> Router {
    match stage {
        Stage::SetRequestId => router.layer(SetRequestIdLayer::new(
            request_id::header(),
            request_id::MakeReqId,
        )),
        Stage::PropagateRequestId => {
            router.layer(PropagateRequestIdLayer::new(request_id::header()))
        }
        Stage::Trace => router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<axum::body::Body>| {
                    let rid = request_id::from_headers(req.headers()).unwrap_or("n/a");

                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri().path(),
                        version = ?req.version(),
                        module = "api_gateway",
                        request_id = %rid,
                        status = Empty,
                        latency_ms = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<axum::body::Body>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record("status", res.status().as_u16());
                        span.record("latency_ms", latency.as_millis());
                    },
                ),
        ),
        Stage::RecordRequestId => router.layer(from_fn(request_id::push_req_id_to_extensions)),
        Stage::RejectAmbiguousPath => {
            router.layer(from_fn(path_validation::reject_ambiguous_path))
        }
        Stage::LoadSecurityContext => router.layer(from_fn_with_state(
            state.loader.clone(),
            security_context::load_security_context,
        )),
        Stage::AuthorizeRoute => router.layer(from_fn_with_state(
            state.route_policy.clone(),
            auth::authorize_route,
        )),
        Stage::PropagateIdentity => router.layer(from_fn_with_state(
            state.propagation.clone(),
            identity_propagation::propagate_identity,
        )),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn position(stage: Stage) -> usize {
        PIPELINE.iter().position(|s| *s == stage).unwrap()
    }

    #[test]
    fn authentication_runs_before_propagation() {
        assert!(position(Stage::LoadSecurityContext) < position(Stage::AuthorizeRoute));
        assert!(position(Stage::AuthorizeRoute) < position(Stage::PropagateIdentity));
    }

    #[test]
    fn path_is_validated_before_authorization() {
        assert!(position(Stage::RejectAmbiguousPath) < position(Stage::LoadSecurityContext));
        assert!(position(Stage::RejectAmbiguousPath) < position(Stage::AuthorizeRoute));
    }

    #[test]
    fn request_id_is_outermost() {
        assert_eq!(PIPELINE[0], Stage::SetRequestId);
        assert!(position(Stage::Trace) < position(Stage::RecordRequestId));
    }
}
