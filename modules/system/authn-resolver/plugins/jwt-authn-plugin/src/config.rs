//! Configuration for the JWT `AuthN` resolver plugin.

use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use serde::{Deserialize, Serialize, Serializer};

/// Plugin configuration.
///
/// `Serialize` renders the secret as a fixed placeholder so the effective
/// configuration can be printed safely.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JwtAuthNConfig {
    /// Shared HMAC verification secret. Required, must not be empty.
    #[serde(serialize_with = "serialize_redacted")]
    pub secret: SecretString,

    /// Expected signing algorithm. Only `HS256`, `HS384` and `HS512` are accepted.
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,

    /// Clock skew tolerance applied to `exp`, `nbf` and `iat`.
    #[serde(default)]
    pub leeway_secs: u64,
}

impl JwtAuthNConfig {
    /// Config with the given secret and defaults for everything else.
    #[must_use]
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            algorithm: default_algorithm(),
            leeway_secs: 0,
        }
    }
}

fn default_algorithm() -> Algorithm {
    Algorithm::HS256
}

fn serialize_redacted<S>(_: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str("[REDACTED]")
}
