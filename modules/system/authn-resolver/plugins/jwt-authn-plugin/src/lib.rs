#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! JWT `AuthN` Resolver Plugin
//!
//! Verifies compact HMAC-signed bearer tokens with a single shared secret and
//! maps their claims to an [`edge_security::Identity`].
//!
//! ## Pipeline
//!
//! 1. [`domain::codec::decode`] checks the structure, verifies the signature
//!    and the time claims against an injected [`domain::clock::Clock`].
//! 2. [`domain::claims::extract_identity`] maps `userId`, `sub` and `role`.
//! 3. [`JwtAuthNResolver`] classifies every failure into a
//!    [`authn_resolver_sdk::RejectionKind`].
//!
//! ## Configuration
//!
//! ```yaml
//! jwt:
//!   secret: "change-me-to-a-long-random-value"
//!   algorithm: HS256
//!   leeway_secs: 0
//! ```

pub mod config;
pub mod domain;

pub use config::JwtAuthNConfig;
pub use domain::clock::{Clock, FixedClock, SystemClock};
pub use domain::error::{ConfigError, DecodeError};
pub use domain::service::JwtAuthNResolver;
