//! Identity propagation filter.
//!
//! Runs after route authorization and before forwarding. For an authenticated
//! request it re-derives the identity from the original bearer token and sets
//! `X-User-Id`, `X-User-Name` and `X-User-Roles` on the forwarded request.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;
use thiserror::Error;

use authn_resolver_sdk::{AuthNResolverClient, AuthOutcome};
use edge_security::{Identity, SecurityContext};

use crate::problem::Problem;

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_NAME: HeaderName = HeaderName::from_static("x-user-name");
pub const X_USER_ROLES: HeaderName = HeaderName::from_static("x-user-roles");

/// Failure to re-derive an identity that was already authenticated earlier in
/// the same request. Always fatal for the request.
#[derive(Debug, Error)]
pub enum PropagationError {
    #[error("bearer token no longer verifies: {0}")]
    Rederivation(String),

    #[error("re-derived identity differs from the authenticated one")]
    IdentityMismatch,

    #[error("identity value is not a valid `{header}` header value")]
    InvalidHeaderValue { header: HeaderName },
}

#[derive(Clone)]
pub struct IdentityPropagation {
    authn_client: Arc<dyn AuthNResolverClient>,
    strip_inbound_headers: bool,
}

impl IdentityPropagation {
    #[must_use]
    pub fn new(authn_client: Arc<dyn AuthNResolverClient>, strip_inbound_headers: bool) -> Self {
        Self {
            authn_client,
            strip_inbound_headers,
        }
    }

    /// Re-derive the identity from the context's bearer token.
    ///
    /// # Errors
    /// Returns [`PropagationError`] when the token does not authenticate again
    /// or yields a different identity.
    pub async fn rederive(&self, ctx: &SecurityContext) -> Result<Identity, PropagationError> {
        match self
            .authn_client
            .authenticate(ctx.bearer_token().expose_secret())
            .await
        {
            AuthOutcome::Authenticated(fresh) if fresh.identity() == ctx.identity() => {
                Ok(fresh.identity().clone())
            }
            AuthOutcome::Authenticated(_) => Err(PropagationError::IdentityMismatch),
            AuthOutcome::Rejected(rejection) => {
                Err(PropagationError::Rederivation(rejection.to_string()))
            }
            AuthOutcome::NoCredential => {
                Err(PropagationError::Rederivation("no credential".to_owned()))
            }
        }
    }
}

/// Remove every client-supplied identity header.
pub fn strip_identity_headers(headers: &mut HeaderMap) {
    for name in [X_USER_ID, X_USER_NAME, X_USER_ROLES] {
        headers.remove(name);
    }
}

/// Set the three identity headers, replacing any existing values.
///
/// # Errors
/// Returns [`PropagationError::InvalidHeaderValue`] when a value contains bytes
/// not allowed in a header.
pub fn inject_identity_headers(
    headers: &mut HeaderMap,
    identity: &Identity,
) -> Result<(), PropagationError> {
    let values = [
        (X_USER_ID, identity.user_id().to_owned()),
        (X_USER_NAME, identity.subject().to_owned()),
        (X_USER_ROLES, identity.joined_roles()),
    ];

    let mut encoded = Vec::with_capacity(values.len());
    for (name, value) in values {
        let value = HeaderValue::from_bytes(value.as_bytes())
            .map_err(|_| PropagationError::InvalidHeaderValue {
                header: name.clone(),
            })?;
        encoded.push((name, value));
    }

    for (name, value) in encoded {
        headers.insert(name, value);
    }
    Ok(())
}

/// Identity propagation middleware.
pub async fn propagate_identity(
    State(state): State<IdentityPropagation>,
    mut req: Request,
    next: Next,
) -> Response {
    if state.strip_inbound_headers {
        strip_identity_headers(req.headers_mut());
    }

    let Some(ctx) = req.extensions().get::<SecurityContext>().cloned() else {
        return next.run(req).await;
    };

    let injected = match state.rederive(&ctx).await {
        Ok(identity) => inject_identity_headers(req.headers_mut(), &identity),
        Err(err) => Err(err),
    };

    if let Err(err) = injected {
        tracing::error!(
            error = %err,
            method = %req.method(),
            path = %req.uri().path(),
            subject = ctx.subject(),
            "identity propagation failed for an authenticated request"
        );
        return Problem::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            "Identity propagation failed",
        )
        .into_response();
    }

    next.run(req).await
}
