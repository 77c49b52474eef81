//! Compact token codec.
//!
//! `decode` is a pure function of token, key and the current instant. The
//! signature is checked before any claim is read, and every time claim is
//! checked before the claims are handed out.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};

use crate::config::JwtAuthNConfig;
use crate::domain::error::{ConfigError, DecodeError};

/// Secrets shorter than this are accepted but logged as weak.
pub const MIN_RECOMMENDED_SECRET_LEN: usize = 32;

/// Process-wide verification key. Immutable after startup.
#[derive(Clone)]
pub struct VerificationKey {
    key: DecodingKey,
    algorithm: Algorithm,
    leeway_secs: u64,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Build a key from a shared HMAC secret.
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptySecret`] for an empty secret and
    /// [`ConfigError::UnsupportedAlgorithm`] for any non-HMAC algorithm.
    pub fn from_secret(
        secret: &[u8],
        algorithm: Algorithm,
        leeway_secs: u64,
    ) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::UnsupportedAlgorithm);
        }
        if secret.len() < MIN_RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                secret_len = secret.len(),
                recommended = MIN_RECOMMENDED_SECRET_LEN,
                "JWT secret is shorter than recommended"
            );
        }

        Ok(Self {
            key: DecodingKey::from_secret(secret),
            algorithm,
            leeway_secs,
        })
    }

    /// Build a key from plugin configuration.
    ///
    /// # Errors
    /// See [`VerificationKey::from_secret`].
    pub fn from_config(cfg: &JwtAuthNConfig) -> Result<Self, ConfigError> {
        Self::from_secret(
            cfg.secret.expose_secret().as_bytes(),
            cfg.algorithm,
            cfg.leeway_secs,
        )
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn validation(&self) -> Validation {
        // Time claims are checked against the injected clock in `check_times`.
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);
        validation
    }

    fn leeway(&self) -> i64 {
        i64::try_from(self.leeway_secs).unwrap_or(i64::MAX)
    }
}

/// A verified token. Only produced by [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    algorithm: Algorithm,
    subject: Option<String>,
    expires_at: Option<i64>,
    claims: Map<String, Value>,
}

impl DecodedToken {
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Registered `sub` claim, if present.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// `exp` as seconds since the Unix epoch, if present.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

/// Decode and verify a compact signed token.
///
/// # Errors
/// - [`DecodeError::Malformed`] when the token is not three non-empty
///   dot-separated segments, a segment is not valid base64url JSON, or a time
///   claim is not numeric
/// - [`DecodeError::BadSignature`] when the signature does not match
/// - [`DecodeError::Expired`] when `exp` plus leeway is before `now`
/// - [`DecodeError::ClaimShape`] when `sub` is not a string
/// - [`DecodeError::OtherVerificationFailure`] for an algorithm mismatch or a
///   token that is not yet valid
pub fn decode(
    token: &str,
    key: &VerificationKey,
    now: DateTime<Utc>,
) -> Result<DecodedToken, DecodeError> {
    check_structure(token)?;

    let data = jsonwebtoken::decode::<Map<String, Value>>(token, &key.key, &key.validation())?;
    let claims = data.claims;

    let expires_at = check_times(&claims, key.leeway(), now.timestamp())?;

    let subject = match claims.get("sub") {
        None | Some(Value::Null) => None,
        Some(Value::String(sub)) => Some(sub.clone()),
        Some(_) => {
            return Err(DecodeError::ClaimShape {
                claim: "sub",
                expected: "a string",
            });
        }
    };

    Ok(DecodedToken {
        algorithm: data.header.alg,
        subject,
        expires_at,
        claims,
    })
}

fn check_structure(token: &str) -> Result<(), DecodeError> {
    if token.is_empty() {
        return Err(DecodeError::Malformed("empty token".to_owned()));
    }

    let segments = token.split('.').count();
    if segments != 3 {
        return Err(DecodeError::Malformed(format!(
            "expected 3 segments, found {segments}"
        )));
    }
    if token.split('.').any(str::is_empty) {
        return Err(DecodeError::Malformed("empty segment".to_owned()));
    }

    Ok(())
}

/// Returns `exp` when all time claims pass.
fn check_times(
    claims: &Map<String, Value>,
    leeway: i64,
    now: i64,
) -> Result<Option<i64>, DecodeError> {
    let expires_at = numeric_date(claims, "exp")?;
    if let Some(exp) = expires_at
        && exp.saturating_add(leeway) < now
    {
        return Err(DecodeError::Expired {
            expired_at: exp,
            now,
        });
    }

    if let Some(nbf) = numeric_date(claims, "nbf")?
        && nbf.saturating_sub(leeway) > now
    {
        return Err(DecodeError::OtherVerificationFailure(format!(
            "token not valid before {nbf}, now {now}"
        )));
    }

    if let Some(iat) = numeric_date(claims, "iat")?
        && iat.saturating_sub(leeway) > now
    {
        return Err(DecodeError::OtherVerificationFailure(format!(
            "token issued in the future at {iat}, now {now}"
        )));
    }

    Ok(expires_at)
}

#[allow(clippy::cast_possible_truncation)]
fn numeric_date(
    claims: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<i64>, DecodeError> {
    match claims.get(name) {
        None => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(secs) = n.as_i64() {
                Ok(Some(secs))
            } else if n.as_u64().is_some() {
                Ok(Some(i64::MAX))
            } else {
                // `as` saturates, fractional seconds are dropped
                Ok(n.as_f64().map(|secs| secs.floor() as i64))
            }
        }
        Some(_) => Err(DecodeError::Malformed(format!(
            "claim `{name}` must be a numeric date"
        ))),
    }
}
