//! Domain models for the `AuthN` resolver.

use std::fmt;

use edge_security::SecurityContext;

/// Classified reason a presented credential was refused.
///
/// Each token decode failure maps to exactly one kind so the HTTP boundary can
/// choose a status and message without re-inspecting the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    /// Token is not in the three-segment compact shape or a segment does not decode.
    Malformed,
    /// Signature check failed.
    BadSignature,
    /// Signature is valid but the expiry has elapsed.
    Expired,
    /// A claim is present with an unexpected shape.
    ClaimShape,
    /// The registered subject claim is absent.
    MissingSubject,
    /// Any other verifier-reported issue (algorithm mismatch, not-yet-valid, ...).
    OtherVerificationFailure,
}

impl RejectionKind {
    /// Stable snake-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::ClaimShape => "claim_shape",
            Self::MissingSubject => "missing_subject",
            Self::OtherVerificationFailure => "other_verification_failure",
        }
    }

    /// Client-facing description of the rejection.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Malformed => "Malformed JWT token",
            Self::BadSignature => "Invalid JWT signature",
            Self::Expired => "JWT token is expired",
            Self::ClaimShape => "JWT claim has an unexpected shape",
            Self::MissingSubject => "JWT subject is missing",
            Self::OtherVerificationFailure => "JWT validation failed",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused credential: the classified kind plus the original cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    kind: RejectionKind,
    cause: String,
}

impl Rejection {
    #[must_use]
    pub fn new(kind: RejectionKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> RejectionKind {
        self.kind
    }

    /// Diagnostic text of the underlying failure. Safe to log; never contains the token.
    #[must_use]
    pub fn cause(&self) -> &str {
        &self.cause
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.cause)
    }
}

/// Result of authenticating one inbound request.
///
/// Exactly one outcome exists per request; it is computed once by the
/// security context loader and not modified afterwards.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Token verified; the context carries the identity and the raw token.
    Authenticated(SecurityContext),
    /// A credential was presented and refused.
    Rejected(Rejection),
    /// No bearer credential was presented.
    NoCredential,
}

impl AuthOutcome {
    #[must_use]
    pub fn security_context(&self) -> Option<&SecurityContext> {
        match self {
            Self::Authenticated(ctx) => Some(ctx),
            Self::Rejected(_) | Self::NoCredential => None,
        }
    }

    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Authenticated(_) | Self::NoCredential => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}
