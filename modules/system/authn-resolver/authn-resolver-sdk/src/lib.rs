//! `AuthN` Resolver SDK
//!
//! This crate provides the public API for the authentication resolver:
//!
//! - [`AuthNResolverClient`] - API trait the gateway consumes
//! - [`AuthOutcome`] - Per-request authentication result
//! - [`Rejection`] / [`RejectionKind`] - Classified verification failures
//!
//! ## Usage
//!
//! ```ignore
//! use authn_resolver_sdk::{AuthNResolverClient, AuthOutcome};
//!
//! match authn.authenticate(token).await {
//!     AuthOutcome::Authenticated(ctx) => { /* attach ctx to the request */ }
//!     AuthOutcome::Rejected(rejection) => { /* 401 on protected routes */ }
//!     AuthOutcome::NoCredential => { /* never produced by a resolver */ }
//! }
//! ```

pub mod api;
pub mod models;

// Re-export main types at crate root
pub use api::AuthNResolverClient;
pub use models::{AuthOutcome, Rejection, RejectionKind};
