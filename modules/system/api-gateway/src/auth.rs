use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::{collections::HashMap, sync::Arc};

use authn_resolver_sdk::{AuthOutcome, Rejection};

use crate::config::PublicRouteConfig;
use crate::problem::Problem;

/// Routes that are public regardless of configuration.
const BUILTIN_PUBLIC_ROUTES: [(&str, &str); 2] = [("GET", "/health"), ("GET", "/healthz")];

/// Path matcher for one HTTP method (or for any method).
#[derive(Clone, Default)]
pub struct RouteMatcher {
    matcher: matchit::Router<()>,
}

impl RouteMatcher {
    fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, path: &str) -> Result<(), matchit::InsertError> {
        match self.matcher.insert(path, ()) {
            // The same pattern listed twice is harmless.
            Err(matchit::InsertError::Conflict { with }) if with == path => Ok(()),
            other => other,
        }
    }

    fn find(&self, path: &str) -> bool {
        self.matcher.at(path).is_ok()
    }
}

/// Convert an allow-list pattern to one or more matchit routes.
///
/// Parameter names are replaced by positional ones since only the match
/// matters, which keeps differently named parameters from conflicting.
///
/// - `{id}`, `:id`, `*` match exactly one segment
/// - a trailing `**` matches the prefix itself and everything below it
fn convert_route_pattern(pattern: &str) -> anyhow::Result<Vec<String>> {
    if !pattern.starts_with('/') {
        anyhow::bail!("route pattern '{pattern}' must start with '/'");
    }

    let segments: Vec<&str> = pattern[1..].split('/').collect();
    let last = segments.len() - 1;
    let mut route = String::with_capacity(pattern.len());

    for (idx, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            if idx != last {
                anyhow::bail!("'**' is only allowed as the last segment of '{pattern}'");
            }
            let prefix = if route.is_empty() {
                "/".to_owned()
            } else {
                route.clone()
            };
            return Ok(vec![prefix, format!("{route}/{{*rest}}")]);
        }

        route.push('/');
        let is_param = *segment == "*"
            || segment.starts_with(':')
            || (segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}'));
        if is_param {
            route.push_str(&format!("{{p{idx}}}"));
        } else if segment.contains("**") {
            anyhow::bail!("'**' must be a whole segment in '{pattern}'");
        } else {
            route.push_str(&segment.replace('{', "{{").replace('}', "}}"));
        }
    }

    Ok(vec![route])
}

/// Whether a route requires authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    /// No authentication required (public route).
    None,
    /// Authentication required.
    Required,
}

/// Deny-by-default route policy: only allow-listed (method, path) pairs are public.
#[derive(Clone)]
pub struct GatewayRoutePolicy {
    public_matchers: Arc<HashMap<Method, RouteMatcher>>,
    any_method_matcher: Arc<RouteMatcher>,
}

impl GatewayRoutePolicy {
    /// Resolve the authentication requirement for a given (method, path).
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> AuthRequirement {
        let is_public = self.any_method_matcher.find(path)
            || self
                .public_matchers
                .get(method)
                .is_some_and(|matcher| matcher.find(path));

        if is_public {
            AuthRequirement::None
        } else {
            AuthRequirement::Required
        }
    }
}

/// Build a [`GatewayRoutePolicy`] from the configured allow-list plus the built-in
/// health routes.
///
/// # Errors
/// Returns an error for an unknown HTTP method or an invalid path pattern.
pub fn build_route_policy(
    public_routes: &[PublicRouteConfig],
) -> Result<GatewayRoutePolicy, anyhow::Error> {
    let mut public_matchers: HashMap<Method, RouteMatcher> = HashMap::new();
    let mut any_method_matcher = RouteMatcher::new();

    let builtin = BUILTIN_PUBLIC_ROUTES
        .iter()
        .map(|&(method, path)| PublicRouteConfig::new(Some(method), path));

    for route in builtin.chain(public_routes.iter().cloned()) {
        let matcher = match route.method.as_deref() {
            None => &mut any_method_matcher,
            Some(method) => {
                let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|e| anyhow::anyhow!("Invalid method '{method}': {e}"))?;
                public_matchers.entry(method).or_insert_with(RouteMatcher::new)
            }
        };

        for matchit_path in convert_route_pattern(&route.path)? {
            matcher.insert(&matchit_path).map_err(|e| {
                anyhow::anyhow!("Failed to insert public route pattern '{}': {e}", route.path)
            })?;
        }
    }

    Ok(GatewayRoutePolicy {
        public_matchers: Arc::new(public_matchers),
        any_method_matcher: Arc::new(any_method_matcher),
    })
}

/// Route authorization middleware.
///
/// Runs after the security context loader. Protected routes are refused with
/// 401 unless the request's [`AuthOutcome`] is `Authenticated`; nothing is
/// forwarded for a refused request.
pub async fn authorize_route(
    State(policy): State<GatewayRoutePolicy>,
    req: Request,
    next: Next,
) -> Response {
    let requirement = policy.resolve(req.method(), req.uri().path());

    let refusal = match (requirement, req.extensions().get::<AuthOutcome>()) {
        (_, None) => {
            tracing::error!(
                path = %req.uri().path(),
                "no authentication outcome on request; security context loader is not installed"
            );
            Some(
                Problem::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "Authentication state unavailable",
                )
                .into_response(),
            )
        }
        (AuthRequirement::None, Some(_))
        | (AuthRequirement::Required, Some(AuthOutcome::Authenticated(_))) => None,
        (AuthRequirement::Required, Some(AuthOutcome::NoCredential)) => {
            tracing::debug!(
                method = %req.method(),
                path = %req.uri().path(),
                "missing bearer credential on protected route"
            );
            Some(missing_credential_response(req.uri().path()))
        }
        (AuthRequirement::Required, Some(AuthOutcome::Rejected(rejection))) => {
            tracing::debug!(
                method = %req.method(),
                path = %req.uri().path(),
                rejection_kind = %rejection.kind(),
                "bearer credential rejected on protected route"
            );
            Some(rejected_credential_response(rejection, req.uri().path()))
        }
    };

    match refusal {
        Some(response) => response,
        None => next.run(req).await,
    }
}

fn missing_credential_response(path: &str) -> Response {
    let mut response = Problem::new(
        StatusCode::UNAUTHORIZED,
        "Unauthorized",
        "Missing or invalid Authorization header",
    )
    .with_instance(path)
    .into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer"),
    );
    response
}

fn rejected_credential_response(rejection: &Rejection, path: &str) -> Response {
    let mut response = Problem::new(
        StatusCode::UNAUTHORIZED,
        "Unauthorized",
        rejection.kind().message(),
    )
    .with_instance(path)
    .into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(r#"Bearer error="invalid_token""#),
    );
    response
}
