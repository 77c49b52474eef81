//! Security context loader.
//!
//! Computes exactly one [`AuthOutcome`] per request and stores it, together
//! with the [`SecurityContext`] on success, in the request extensions. Nothing
//! outlives the request.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{Extensions, HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;

use authn_resolver_sdk::{AuthNResolverClient, AuthOutcome};

/// Authorization scheme marker, including the separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Clone)]
pub struct SecurityContextLoader {
    authn_client: Arc<dyn AuthNResolverClient>,
}

impl SecurityContextLoader {
    #[must_use]
    pub fn new(authn_client: Arc<dyn AuthNResolverClient>) -> Self {
        Self { authn_client }
    }

    /// Authenticate the request's bearer credential.
    ///
    /// A missing `Authorization` header or another scheme is
    /// [`AuthOutcome::NoCredential`] and the resolver is not called.
    pub async fn load(&self, headers: &HeaderMap) -> AuthOutcome {
        match extract_bearer_token(headers) {
            Some(token) => self.authn_client.authenticate(token).await,
            None => AuthOutcome::NoCredential,
        }
    }

    /// Attach the outcome to the request scope. Never persisted across requests.
    pub fn save(extensions: &mut Extensions, outcome: AuthOutcome) {
        if let AuthOutcome::Authenticated(ctx) = &outcome {
            extensions.insert(ctx.clone());
        }
        extensions.insert(outcome);
    }
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX).map(str::trim))
}

/// Middleware running [`SecurityContextLoader::load`] once per request.
pub async fn load_security_context(
    State(loader): State<SecurityContextLoader>,
    mut req: Request,
    next: Next,
) -> Response {
    let outcome = loader.load(req.headers()).await;
    SecurityContextLoader::save(req.extensions_mut(), outcome);
    next.run(req).await
}
