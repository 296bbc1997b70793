//! User identity
//!
//! Projects the untyped claims returned by an authorizer onto the fixed
//! identity shape the host pipeline consumes: an ID plus string metadata.

use crate::auth::{AuthError, ClaimsMap};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Claims every authenticated identity must carry
pub const REQUIRED_CLAIMS: [&str; 2] = ["roles", "email"];

/// Claims copied into metadata when present
pub const OPTIONAL_CLAIMS: [&str; 4] = ["claim_id", "sub", "email", "name"];

/// Claim used as the identity's ID
pub const ID_CLAIM: &str = "id";

/// Authenticated principal as seen by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    pub id: String,
    pub metadata: BTreeMap<String, String>,
}

fn string_claim<'a>(claims: &'a ClaimsMap, claim: &str) -> Result<Option<&'a str>, AuthError> {
    match claims.get(claim) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(AuthError::MalformedClaims {
            claim: claim.to_string(),
            reason: format!("must be a string, got {}", json_type(other)),
        }),
    }
}

fn required_claim<'a>(claims: &'a ClaimsMap, claim: &str) -> Result<&'a str, AuthError> {
    string_claim(claims, claim)?.ok_or_else(|| AuthError::MalformedClaims {
        claim: claim.to_string(),
        reason: "is missing".to_string(),
    })
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Build a user identity from verified claims
///
/// Returns `Ok(None)` when there are no claims, meaning the request is not
/// authenticated. Any claim of the wrong type fails the whole conversion;
/// no partial identity is ever returned.
pub fn adapt(claims: Option<&ClaimsMap>) -> Result<Option<UserIdentity>, AuthError> {
    let claims = match claims {
        Some(claims) if !claims.is_empty() => claims,
        _ => return Ok(None),
    };

    let mut identity = UserIdentity::default();
    for claim in REQUIRED_CLAIMS {
        let value = required_claim(claims, claim)?;
        identity.metadata.insert(claim.to_string(), value.to_string());
    }

    if let Some(id) = string_claim(claims, ID_CLAIM)? {
        identity.id = id.to_string();
    }

    for claim in OPTIONAL_CLAIMS {
        if let Some(value) = string_claim(claims, claim)? {
            identity.metadata.insert(claim.to_string(), value.to_string());
        }
    }

    debug!(
        user.id = %identity.id,
        user.metadata = ?identity.metadata.keys().collect::<Vec<_>>(),
        "Resolved user identity"
    );

    Ok(Some(identity))
}
