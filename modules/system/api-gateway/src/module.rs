//! API Gateway module definition
//!
//! Contains the `ApiGateway` struct: router assembly and the HTTP server loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use authn_resolver_sdk::AuthNResolverClient;

use crate::auth;
use crate::config::ApiGatewayConfig;
use crate::middleware::identity_propagation::IdentityPropagation;
use crate::middleware::security_context::SecurityContextLoader;
use crate::pipeline::{self, PIPELINE, PipelineState};
use crate::proxy::{self, ProxyState, RouteTable};
use crate::upstream::{HttpUpstream, Upstream};
use crate::web;

/// Edge API gateway: owns the HTTP server and the request pipeline.
pub struct ApiGateway {
    config: ApiGatewayConfig,
    authn_client: Arc<dyn AuthNResolverClient>,
    upstream: Arc<dyn Upstream>,
}

impl ApiGateway {
    /// Create a gateway forwarding over plain HTTP.
    #[must_use]
    pub fn new(config: ApiGatewayConfig, authn_client: Arc<dyn AuthNResolverClient>) -> Self {
        let upstream = Arc::new(HttpUpstream::new(Duration::from_secs(
            config.upstream_timeout_secs,
        )));
        Self::with_upstream(config, authn_client, upstream)
    }

    /// Create a gateway with a custom upstream dispatcher.
    #[must_use]
    pub fn with_upstream(
        config: ApiGatewayConfig,
        authn_client: Arc<dyn AuthNResolverClient>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            config,
            authn_client,
            upstream,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiGatewayConfig {
        &self.config
    }

    /// Build the HTTP router: health endpoints, upstream forwarding as the
    /// fallback, wrapped in the [`PIPELINE`] stages.
    ///
    /// # Errors
    /// Returns an error if the public route allow-list or the upstream route
    /// table is invalid.
    pub fn build_router(&self) -> Result<Router> {
        let route_policy = auth::build_route_policy(&self.config.public_routes)?;
        let routes = RouteTable::from_config(&self.config.routes)?;

        let proxy_state = ProxyState {
            routes: Arc::new(routes),
            upstream: self.upstream.clone(),
        };

        // Fallback is set before layering so the pipeline also wraps it.
        let router = Router::new()
            .route("/health", get(web::health_check))
            .route("/healthz", get(web::liveness))
            .fallback(proxy::forward)
            .with_state(proxy_state);

        let state = PipelineState {
            loader: SecurityContextLoader::new(self.authn_client.clone()),
            route_policy,
            propagation: IdentityPropagation::new(
                self.authn_client.clone(),
                self.config.strip_inbound_identity_headers,
            ),
        };

        Ok(pipeline::apply(router, &PIPELINE, &state))
    }

    /// Parse bind address from configuration string.
    fn parse_bind_address(bind_addr: &str) -> Result<SocketAddr> {
        bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{bind_addr}': {e}"))
    }

    /// Bind the configured address and serve until cancelled.
    ///
    /// # Errors
    /// Returns an error if the router cannot be built, the address cannot be
    /// bound, or the server fails.
    pub async fn serve(&self, cancel: CancellationToken) -> Result<()> {
        let addr = Self::parse_bind_address(&self.config.bind_addr)?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener, cancel).await
    }

    /// Serve on an already bound listener until cancelled.
    ///
    /// # Errors
    /// Returns an error if the router cannot be built or the server fails.
    pub async fn serve_on(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let router = self.build_router()?;
        tracing::info!("HTTP server bound on {}", listener.local_addr()?);

        // Graceful shutdown on cancel
        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}
