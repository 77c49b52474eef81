#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Edge API Gateway
//!
//! Authenticates inbound requests with a bearer token, decides per route
//! whether an identity is required, injects the identity into the request as
//! `X-User-*` headers and forwards it to the matching upstream service.
//!
//! Request execution order (outermost first) is the explicit list in
//! [`pipeline::PIPELINE`]:
//! set request id -> propagate request id -> trace -> record request id
//! -> load security context -> authorize route -> propagate identity -> router

pub mod auth;
pub mod config;
pub mod fallback;
pub mod middleware;
pub mod module;
pub mod pipeline;
pub mod problem;
pub mod proxy;
pub mod upstream;
pub mod web;

pub use config::ApiGatewayConfig;
pub use module::ApiGateway;
