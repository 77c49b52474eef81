//! Service implementation for the JWT `AuthN` resolver plugin.

use std::sync::Arc;

use authn_resolver_sdk::{AuthOutcome, Rejection, RejectionKind};
use edge_security::SecurityContext;

use crate::config::JwtAuthNConfig;
use crate::domain::claims::extract_identity;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::codec::{VerificationKey, decode};
use crate::domain::error::{ConfigError, DecodeError};

/// JWT `AuthN` resolver.
///
/// Holds only the immutable verification key and a clock; every call performs
/// a full independent verification.
#[derive(Clone)]
pub struct JwtAuthNResolver {
    key: VerificationKey,
    clock: Arc<dyn Clock>,
}

impl JwtAuthNResolver {
    #[must_use]
    pub fn new(key: VerificationKey, clock: Arc<dyn Clock>) -> Self {
        Self { key, clock }
    }

    /// Create a resolver from plugin configuration using the system clock.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the secret is empty or the algorithm is not HMAC.
    pub fn from_config(cfg: &JwtAuthNConfig) -> Result<Self, ConfigError> {
        let key = VerificationKey::from_config(cfg)?;
        tracing::info!(
            algorithm = ?key.algorithm(),
            leeway_secs = cfg.leeway_secs,
            "JWT resolver configured"
        );
        Ok(Self::new(key, Arc::new(SystemClock)))
    }

    /// Authenticate a bearer token.
    ///
    /// Never returns [`AuthOutcome::NoCredential`].
    #[must_use]
    pub fn resolve(&self, bearer_token: &str) -> AuthOutcome {
        match self.verify(bearer_token) {
            Ok(ctx) => AuthOutcome::Authenticated(ctx),
            Err(rejection) => {
                tracing::debug!(
                    rejection_kind = %rejection.kind(),
                    cause = rejection.cause(),
                    "bearer token rejected"
                );
                AuthOutcome::Rejected(rejection)
            }
        }
    }

    fn verify(&self, bearer_token: &str) -> Result<SecurityContext, Rejection> {
        let decoded =
            decode(bearer_token, &self.key, self.clock.now()).map_err(|e| to_rejection(&e))?;

        if decoded.subject().is_none_or(str::is_empty) {
            return Err(Rejection::new(
                RejectionKind::MissingSubject,
                "token has no `sub` claim",
            ));
        }

        let identity = extract_identity(&decoded).map_err(|e| to_rejection(&e))?;
        Ok(SecurityContext::new(identity, bearer_token.to_owned()))
    }
}

fn to_rejection(err: &DecodeError) -> Rejection {
    let kind = match err {
        DecodeError::Malformed(_) => RejectionKind::Malformed,
        DecodeError::BadSignature => RejectionKind::BadSignature,
        DecodeError::Expired { .. } => RejectionKind::Expired,
        DecodeError::ClaimShape { .. } => RejectionKind::ClaimShape,
        DecodeError::OtherVerificationFailure(_) => RejectionKind::OtherVerificationFailure,
    };
    Rejection::new(kind, err.to_string())
}
