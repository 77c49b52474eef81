#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Shared fixtures for gateway integration tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use api_gateway::ApiGateway;
use api_gateway::config::{ApiGatewayConfig, PublicRouteConfig, UpstreamRouteConfig};
use api_gateway::middleware::request_id::XRequestId;
use api_gateway::upstream::{DispatchError, Upstream};
use async_trait::async_trait;
use authn_resolver_sdk::{AuthNResolverClient, AuthOutcome, Rejection, RejectionKind};
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response, Uri};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use jwt_authn_plugin::{JwtAuthNConfig, JwtAuthNResolver};
use serde_json::Value;

pub const SECRET: &str = "gateway-integration-secret-0123456789";
pub const CAR_SERVICE: &str = "auto-car-service";

pub fn sign(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn valid_token() -> String {
    sign(&serde_json::json!({
        "sub": "alice",
        "userId": 42,
        "role": ["admin", "ops"],
        "exp": chrono::Utc::now().timestamp() + 3600,
    }))
}

/// Resolver wrapper counting how often the gateway asks for verification.
pub struct CountingResolver {
    inner: JwtAuthNResolver,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new() -> Self {
        Self {
            inner: JwtAuthNResolver::from_config(&JwtAuthNConfig::with_secret(SECRET)).unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthNResolverClient for CountingResolver {
    async fn authenticate(&self, bearer_token: &str) -> AuthOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.authenticate(bearer_token).await
    }
}

/// Resolver that verifies a token once and rejects every later call, as if
/// the key changed between pipeline stages.
pub struct RevokingResolver {
    inner: CountingResolver,
}

impl RevokingResolver {
    pub fn new() -> Self {
        Self {
            inner: CountingResolver::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }
}

#[async_trait]
impl AuthNResolverClient for RevokingResolver {
    async fn authenticate(&self, bearer_token: &str) -> AuthOutcome {
        if self.inner.calls() == 0 {
            self.inner.authenticate(bearer_token).await
        } else {
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            AuthOutcome::Rejected(Rejection::new(
                RejectionKind::BadSignature,
                "verification key rotated",
            ))
        }
    }
}

#[derive(Debug, Clone)]
pub struct Forwarded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub request_id: Option<String>,
}

/// Upstream double recording every dispatched request.
#[derive(Default)]
pub struct RecordingUpstream {
    forwarded: Mutex<Vec<Forwarded>>,
    unreachable: bool,
}

impl RecordingUpstream {
    pub fn unreachable() -> Self {
        Self {
            forwarded: Mutex::new(Vec::new()),
            unreachable: true,
        }
    }

    pub fn forwarded(&self) -> Vec<Forwarded> {
        self.forwarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for RecordingUpstream {
    async fn dispatch(
        &self,
        target: Uri,
        req: Request<Body>,
    ) -> Result<Response<Body>, DispatchError> {
        self.forwarded.lock().unwrap().push(Forwarded {
            method: req.method().clone(),
            uri: target,
            headers: req.headers().clone(),
            request_id: req.extensions().get::<XRequestId>().map(|r| r.0.clone()),
        });

        if self.unreachable {
            Err(DispatchError::Connect("connection refused".to_owned()))
        } else {
            Ok(Response::new(Body::from("upstream ok")))
        }
    }
}

pub fn gateway_config() -> ApiGatewayConfig {
    ApiGatewayConfig {
        public_routes: vec![
            PublicRouteConfig::new(Some("POST"), "/login"),
            PublicRouteConfig::new(Some("POST"), "/register"),
            PublicRouteConfig::new(None, "/actuator/**"),
        ],
        routes: vec![
            UpstreamRouteConfig {
                service: "auth-service".to_owned(),
                path_prefix: "/".to_owned(),
                upstream: "http://auth-service.test".to_owned(),
                strip_prefix: false,
            },
            UpstreamRouteConfig {
                service: CAR_SERVICE.to_owned(),
                path_prefix: "/cars".to_owned(),
                upstream: "http://car-service.test:8081".to_owned(),
                strip_prefix: false,
            },
        ],
        ..ApiGatewayConfig::default()
    }
}

pub struct TestGateway {
    pub router: Router,
    pub resolver: Arc<CountingResolver>,
    pub upstream: Arc<RecordingUpstream>,
}

pub fn gateway_with(config: ApiGatewayConfig, upstream: RecordingUpstream) -> TestGateway {
    let resolver = Arc::new(CountingResolver::new());
    let upstream = Arc::new(upstream);
    let router = ApiGateway::with_upstream(config, resolver.clone(), upstream.clone())
        .build_router()
        .unwrap();

    TestGateway {
        router,
        resolver,
        upstream,
    }
}

/// Router built around an arbitrary resolver.
pub fn router_with_resolver(
    resolver: Arc<dyn AuthNResolverClient>,
    upstream: Arc<RecordingUpstream>,
) -> Router {
    ApiGateway::with_upstream(gateway_config(), resolver, upstream)
        .build_router()
        .unwrap()
}

pub fn gateway() -> TestGateway {
    gateway_with(gateway_config(), RecordingUpstream::default())
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
