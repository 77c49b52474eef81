//! Error types for token decoding and verification-key construction.

use thiserror::Error;

/// Token decode failure.
///
/// The codec and the claim extractor return these; the resolver is the only
/// place that turns them into rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not a three-segment compact token, or a segment does not decode.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Signature does not match header and payload.
    #[error("signature verification failed")]
    BadSignature,

    /// Signature is valid but `exp` has elapsed.
    #[error("token expired at {expired_at}, now {now}")]
    Expired { expired_at: i64, now: i64 },

    /// A claim is present with an unexpected shape.
    #[error("claim `{claim}` must be {expected}")]
    ClaimShape {
        claim: &'static str,
        expected: &'static str,
    },

    /// Anything else the verifier refuses.
    #[error("verification failed: {0}")]
    OtherVerificationFailure(String),
}

impl From<jsonwebtoken::errors::Error> for DecodeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(err.to_string()),
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired {
                expired_at: 0,
                now: 0,
            },
            _ => Self::OtherVerificationFailure(err.to_string()),
        }
    }
}

/// Verification key construction failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("jwt secret must not be empty")]
    EmptySecret,

    #[error("unsupported jwt algorithm: only HS256, HS384 and HS512 are accepted")]
    UnsupportedAlgorithm,
}
