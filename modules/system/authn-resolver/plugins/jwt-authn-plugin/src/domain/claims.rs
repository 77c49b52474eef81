//! Claim-to-identity mapping.
//!
//! `userId` is lenient (absent or oddly shaped becomes an empty string) while
//! `role` is strict (a present value of the wrong shape is an error). Both
//! behaviors are relied on by callers.

use edge_security::Identity;
use serde_json::{Map, Value};

use crate::domain::codec::DecodedToken;
use crate::domain::error::DecodeError;

pub const USER_ID_CLAIM: &str = "userId";
pub const ROLE_CLAIM: &str = "role";

/// Map a verified token to an [`Identity`].
///
/// The subject is copied as-is; an absent subject becomes an empty string and
/// must be rejected by the caller before this is called.
///
/// # Errors
/// Returns [`DecodeError::ClaimShape`] when `role` is present but not a list
/// of strings, or a role name contains a comma.
pub fn extract_identity(token: &DecodedToken) -> Result<Identity, DecodeError> {
    let user_id = user_id(token.claims());
    let roles = roles(token.claims())?;
    let subject = token.subject().unwrap_or_default().to_owned();

    Ok(Identity::new(user_id, subject, roles))
}

fn user_id(claims: &Map<String, Value>) -> String {
    match claims.get(USER_ID_CLAIM) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn roles(claims: &Map<String, Value>) -> Result<Vec<String>, DecodeError> {
    let items = match claims.get(ROLE_CLAIM) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(role_shape_error()),
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(role) if !role.contains(',') => Ok(role.clone()),
            _ => Err(role_shape_error()),
        })
        .collect()
}

fn role_shape_error() -> DecodeError {
    DecodeError::ClaimShape {
        claim: ROLE_CLAIM,
        expected: "a list of role names without commas",
    }
}
