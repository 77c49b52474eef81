//! Route table and the forwarding handler.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{HeaderMap, HeaderName, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};

use crate::config::UpstreamRouteConfig;
use crate::fallback;
use crate::middleware::path_validation;
use crate::middleware::request_id::XRequestId;
use crate::problem::Problem;
use crate::upstream::{DispatchError, Upstream};

/// Connection-scoped headers never forwarded in either direction.
const HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Clone)]
pub struct UpstreamRoute {
    service: String,
    path_prefix: String,
    base: Uri,
    strip_prefix: bool,
}

impl UpstreamRoute {
    fn from_config(cfg: &UpstreamRouteConfig) -> anyhow::Result<Self> {
        if !cfg.path_prefix.starts_with('/') {
            anyhow::bail!(
                "route '{}': path_prefix '{}' must start with '/'",
                cfg.service,
                cfg.path_prefix
            );
        }

        let base: Uri = cfg.upstream.parse().with_context(|| {
            format!("route '{}': invalid upstream '{}'", cfg.service, cfg.upstream)
        })?;
        if base.scheme() != Some(&Scheme::HTTP) || base.authority().is_none() {
            anyhow::bail!(
                "route '{}': upstream '{}' must be an absolute http:// URI",
                cfg.service,
                cfg.upstream
            );
        }

        Ok(Self {
            service: cfg.service.clone(),
            path_prefix: cfg.path_prefix.trim_end_matches('/').to_owned(),
            base,
            strip_prefix: cfg.strip_prefix,
        })
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Whether `path` is the prefix itself or lies below it.
    fn matches(&self, path: &str) -> bool {
        path.strip_prefix(self.path_prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Absolute URI to send the request to.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidTarget`] if the joined URI does not parse.
    pub fn target_uri(&self, original: &Uri) -> Result<Uri, DispatchError> {
        let mut path = original.path();
        if self.strip_prefix {
            path = path.strip_prefix(self.path_prefix.as_str()).unwrap_or(path);
        }

        let base_path = self.base.path().trim_end_matches('/');
        let mut joined = format!("{base_path}/{}", path.trim_start_matches('/'));
        if let Some(query) = original.query() {
            joined.push('?');
            joined.push_str(query);
        }

        let invalid = |reason: String| DispatchError::InvalidTarget {
            target: format!("{}{joined}", self.base),
            reason,
        };
        let path_and_query = joined
            .parse::<PathAndQuery>()
            .map_err(|e| invalid(e.to_string()))?;

        let mut parts = self.base.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        Uri::from_parts(parts).map_err(|e| invalid(e.to_string()))
    }
}

/// Upstream routes ordered so the longest prefix is tried first.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<UpstreamRoute>,
}

impl RouteTable {
    /// # Errors
    /// Returns an error for a prefix not starting with `/` or an upstream that
    /// is not an absolute `http://` URI.
    pub fn from_config(routes: &[UpstreamRouteConfig]) -> anyhow::Result<Self> {
        let mut routes = routes
            .iter()
            .map(UpstreamRoute::from_config)
            .collect::<anyhow::Result<Vec<_>>>()?;
        routes.sort_by_key(|r| std::cmp::Reverse(r.path_prefix.len()));
        Ok(Self { routes })
    }

    #[must_use]
    pub fn find(&self, path: &str) -> Option<&UpstreamRoute> {
        self.routes.iter().find(|r| r.matches(path))
    }
}

#[derive(Clone)]
pub struct ProxyState {
    pub routes: Arc<RouteTable>,
    pub upstream: Arc<dyn Upstream>,
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.into_iter().chain(HOP_BY_HOP_HEADERS) {
        headers.remove(name);
    }
}

/// Router fallback: forward the request to the matching upstream.
pub async fn forward(State(state): State<ProxyState>, mut req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    if let Err(reason) = path_validation::check_path(&path) {
        return path_validation::ambiguous_path_response(reason, &path);
    }

    let Some(route) = state.routes.find(&path) else {
        return Problem::new(
            StatusCode::NOT_FOUND,
            "Not Found",
            format!("No upstream route for {path}"),
        )
        .with_instance(path)
        .into_response();
    };

    let target = match route.target_uri(req.uri()) {
        Ok(target) => target,
        Err(err) => return bad_gateway(&err, &path),
    };

    let request_id = req
        .extensions()
        .get::<XRequestId>()
        .map_or_else(|| fallback::request_id_or_generate(req.headers()), |r| r.0.clone());

    strip_hop_by_hop_headers(req.headers_mut());
    req.headers_mut().remove(header::HOST);

    tracing::debug!(service = route.service(), %target, "forwarding request upstream");

    let started = Instant::now();
    match state.upstream.dispatch(target, req).await {
        Ok(mut response) => {
            strip_hop_by_hop_headers(response.headers_mut());
            response
        }
        Err(err @ DispatchError::InvalidTarget { .. }) => bad_gateway(&err, &path),
        Err(err @ (DispatchError::Connect(_) | DispatchError::Timeout { .. })) => {
            tracing::debug!(error = %err, service = route.service(), "upstream dispatch failed");
            fallback::service_unavailable(
                route.service(),
                &request_id,
                &method,
                &path,
                started.elapsed(),
            )
        }
    }
}

fn bad_gateway(err: &DispatchError, path: &str) -> Response {
    tracing::error!(error = %err, path, "cannot build upstream request");
    Problem::new(
        StatusCode::BAD_GATEWAY,
        "Bad Gateway",
        "Upstream target is invalid",
    )
    .with_instance(path)
    .into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn route(prefix: &str, upstream: &str, strip_prefix: bool) -> UpstreamRouteConfig {
        UpstreamRouteConfig {
            service: format!("svc{prefix}"),
            path_prefix: prefix.to_owned(),
            upstream: upstream.to_owned(),
            strip_prefix,
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::from_config(&[
            route("/api", "http://api:80", false),
            route("/api/cars", "http://cars:80", false),
        ])
        .unwrap();

        assert_eq!(table.find("/api/cars/1").unwrap().service(), "svc/api/cars");
        assert_eq!(table.find("/api/users").unwrap().service(), "svc/api");
        assert_eq!(table.find("/api").unwrap().service(), "svc/api");
        assert!(table.find("/apix").is_none());
        assert!(table.find("/other").is_none());
    }

    #[test]
    fn target_uri_keeps_path_and_query() {
        let table = RouteTable::from_config(&[route("/cars", "http://cars:8081", false)]).unwrap();
        let uri: Uri = "/cars/7?color=red".parse().unwrap();

        let target = table.find(uri.path()).unwrap().target_uri(&uri).unwrap();
        assert_eq!(target.to_string(), "http://cars:8081/cars/7?color=red");
    }

    #[test]
    fn target_uri_strips_prefix_and_joins_base_path() {
        let table =
            RouteTable::from_config(&[route("/cars/", "http://cars:8081/v1/", true)]).unwrap();

        let uri: Uri = "/cars/7".parse().unwrap();
        let target = table.find(uri.path()).unwrap().target_uri(&uri).unwrap();
        assert_eq!(target.to_string(), "http://cars:8081/v1/7");

        let root: Uri = "/cars".parse().unwrap();
        let target = table.find(root.path()).unwrap().target_uri(&root).unwrap();
        assert_eq!(target.to_string(), "http://cars:8081/v1/");
    }

    #[test]
    fn invalid_routes_are_rejected() {
        assert!(RouteTable::from_config(&[route("cars", "http://cars:80", false)]).is_err());
        assert!(RouteTable::from_config(&[route("/cars", "https://cars:443", false)]).is_err());
        assert!(RouteTable::from_config(&[route("/cars", "not a uri", false)]).is_err());
        assert!(RouteTable::from_config(&[route("/cars", "/relative", false)]).is_err());
    }

    #[test]
    fn hop_by_hop_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-trace-hop"));
        headers.insert("x-trace-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));

        strip_hop_by_hop_headers(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::AUTHORIZATION));
    }
}
