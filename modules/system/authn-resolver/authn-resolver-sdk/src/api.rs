//! Public API trait for the `AuthN` resolver.
//!
//! This trait defines the interface the gateway uses to authenticate
//! bearer tokens. Implementations live in plugin crates.

use async_trait::async_trait;

use crate::models::AuthOutcome;

/// Public API trait for the `AuthN` resolver.
///
/// The resolver is the single trust boundary of the gateway: nothing
/// downstream re-verifies a token signature on its own.
///
/// ```ignore
/// let outcome = authn.authenticate("eyJhbGciOi...").await;
/// ```
///
/// # Security
///
/// A successful outcome carries a `SecurityContext` that keeps the original
/// bearer token for later identity re-derivation.
#[async_trait]
pub trait AuthNResolverClient: Send + Sync {
    /// Authenticate a bearer token and return the classified outcome.
    ///
    /// # Arguments
    ///
    /// * `bearer_token` - The raw bearer token string (without "Bearer " prefix)
    ///
    /// Implementations never panic on adversarial input and never return
    /// [`AuthOutcome::NoCredential`]; every failure is an
    /// [`AuthOutcome::Rejected`] value.
    async fn authenticate(&self, bearer_token: &str) -> AuthOutcome;
}
