//! Upstream dispatch boundary.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The upstream could not be reached or the exchange broke off.
    #[error("upstream request failed: {0}")]
    Connect(String),

    #[error("upstream did not respond within {secs}s")]
    Timeout { secs: u64 },

    #[error("invalid upstream target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
}

/// Sends a prepared request to an upstream service.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn dispatch(
        &self,
        target: Uri,
        req: Request<Body>,
    ) -> Result<Response<Body>, DispatchError>;
}

/// Plain-HTTP upstream on a pooled `hyper-util` client.
#[derive(Clone)]
pub struct HttpUpstream {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HttpUpstream {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            timeout,
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn dispatch(
        &self,
        target: Uri,
        mut req: Request<Body>,
    ) -> Result<Response<Body>, DispatchError> {
        *req.uri_mut() = target;

        match tokio::time::timeout(self.timeout, self.client.request(req)).await {
            Ok(Ok(response)) => Ok(response.map(Body::new)),
            Ok(Err(e)) => Err(DispatchError::Connect(e.to_string())),
            Err(_) => Err(DispatchError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}
