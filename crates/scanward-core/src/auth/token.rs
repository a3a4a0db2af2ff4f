//! Credential decoding.
//!
//! Credentials are JWT-shaped (`header.claims.signature`). Only the claims
//! segment is read. The signature and `exp` are NOT checked here: the
//! backend verifies the token on every request, so a decoded identity is
//! only good for deciding what to render.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};

use super::AuthError;
use crate::models::identity::DEFAULT_DISPLAY_NAME;
use crate::models::{Identity, Role};

/// Number of `.`-separated segments in a credential.
const SEGMENT_COUNT: usize = 3;

/// Claims tried in order for the display name.
const DISPLAY_NAME_CLAIMS: [&str; 3] = ["username", "email", "sub"];

const ROLE_CLAIM: &str = "role";

/// Opaque bearer credential issued by the backend.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer_value(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Decode the claims into an identity.
    pub fn decode(&self) -> Result<Identity, AuthError> {
        decode_identity(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} bytes>)", self.0.len())
    }
}

/// Decode a credential string into the identity it describes.
pub fn decode_identity(token: &str) -> Result<Identity, AuthError> {
    let claims = decode_claims(token)?;
    identity_from_claims(&claims)
}

fn decode_claims(token: &str) -> Result<Map<String, Value>, AuthError> {
    // The credential travels verbatim in the Authorization header
    if !token.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(AuthError::MalformedCredential(
            "contains whitespace or non-ASCII characters".to_string(),
        ));
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != SEGMENT_COUNT {
        return Err(AuthError::MalformedCredential(format!(
            "expected {} segments, found {}",
            SEGMENT_COUNT,
            segments.len()
        )));
    }

    // Some issuers pad the segment even though base64url in JWTs is unpadded
    let payload = segments[1].trim_end_matches('=');
    if payload.is_empty() {
        return Err(AuthError::MalformedCredential(
            "claims segment is empty".to_string(),
        ));
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
        AuthError::MalformedCredential(format!("claims segment is not base64url: {}", e))
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(AuthError::MalformedCredential(
            "claims payload is not an object".to_string(),
        )),
        Err(e) => Err(AuthError::MalformedCredential(format!(
            "claims payload is not JSON: {}",
            e
        ))),
    }
}

fn identity_from_claims(claims: &Map<String, Value>) -> Result<Identity, AuthError> {
    let role = match claims.get(ROLE_CLAIM).and_then(Value::as_str) {
        Some(raw) => raw.parse::<Role>().map_err(AuthError::UnrecognizedRole)?,
        None => return Err(AuthError::MissingRoleClaim),
    };

    let display_name = DISPLAY_NAME_CLAIMS
        .iter()
        .find_map(|claim| {
            claims
                .get(*claim)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(DEFAULT_DISPLAY_NAME);

    Ok(Identity::new(display_name, role))
}
