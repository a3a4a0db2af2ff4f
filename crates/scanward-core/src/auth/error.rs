use thiserror::Error;

/// Failures inside the session store.
///
/// None of these escape as a crash: the store falls back to an
/// unauthenticated session and cleans up what it persisted. Only
/// `SessionStore::establish` hands the error back, and front ends should
/// show a generic message instead of its text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    #[error("Credential has no role claim")]
    MissingRoleClaim,

    #[error("Credential carries unrecognized role: {0}")]
    UnrecognizedRole(String),

    #[error("Session storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl AuthError {
    /// True for failures caused by the credential itself rather than storage.
    pub fn is_decode_failure(&self) -> bool {
        !matches!(self, AuthError::StorageUnavailable(_))
    }
}

/// Message shown to the user when a freshly issued credential is unusable.
pub const INVALID_SESSION_MESSAGE: &str = "Invalid session. Please log in again.";
