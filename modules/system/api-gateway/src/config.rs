use serde::{Deserialize, Serialize};

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_owned()
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

fn default_strip_inbound_identity_headers() -> bool {
    true
}

/// API gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiGatewayConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Routes reachable without a credential. Everything else requires one.
    #[serde(default)]
    pub public_routes: Vec<PublicRouteConfig>,

    /// Upstream services, matched by longest path prefix.
    #[serde(default)]
    pub routes: Vec<UpstreamRouteConfig>,

    /// Upper bound for one upstream round trip.
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// Drop client-supplied `X-User-*` headers before forwarding.
    #[serde(default = "default_strip_inbound_identity_headers")]
    pub strip_inbound_identity_headers: bool,
}

impl Default for ApiGatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_routes: Vec::new(),
            routes: Vec::new(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            strip_inbound_identity_headers: default_strip_inbound_identity_headers(),
        }
    }
}

/// One allow-list entry.
///
/// `path` accepts literal segments, `{param}` / `:param` / `*` for a single
/// segment, and a trailing `/**` for the prefix and everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PublicRouteConfig {
    /// HTTP method; any method when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub path: String,
}

impl PublicRouteConfig {
    #[must_use]
    pub fn new(method: Option<&str>, path: &str) -> Self {
        Self {
            method: method.map(str::to_owned),
            path: path.to_owned(),
        }
    }
}

/// Upstream service route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamRouteConfig {
    /// Service name reported by the unavailability response.
    pub service: String,
    pub path_prefix: String,
    /// Base URI, e.g. `http://car-service:8081`.
    pub upstream: String,
    /// Remove `path_prefix` from the forwarded path.
    #[serde(default)]
    pub strip_prefix: bool,
}
