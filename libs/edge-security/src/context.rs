use secrecy::SecretString;

use crate::identity::Identity;

/// `SecurityContext` carries the authenticated identity for one request.
///
/// Built by the `AuthN` resolver on successful verification and attached to the
/// request extensions by the gateway. It is dropped together with the request and
/// never stored between requests.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    identity: Identity,
    /// Original bearer token, kept so later pipeline stages can re-derive identity
    /// headers. Wrapped in `SecretString` so `Debug` redacts the value.
    bearer_token: SecretString,
}

impl SecurityContext {
    #[must_use]
    pub fn new(identity: Identity, bearer_token: impl Into<SecretString>) -> Self {
        Self {
            identity,
            bearer_token: bearer_token.into(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Shortcut for the authenticated subject (`sub` claim).
    #[must_use]
    pub fn subject(&self) -> &str {
        self.identity.subject()
    }

    /// Raw bearer token the identity was derived from.
    #[must_use]
    pub fn bearer_token(&self) -> &SecretString {
        &self.bearer_token
    }
}
