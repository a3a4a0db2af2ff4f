//! Domain models for the signed-in user.
//!
//! An `Identity` is advisory: it is decoded from the credential without
//! verifying its signature, so it may only drive UI gating. The backend
//! authorizes every request independently.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Display name used when the credential carries no usable identifier claim.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// Access level of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Claim value as issued by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(other.to_string()),
        }
    }
}

/// The signed-in user as the UI sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Identity {
    pub display_name: String,
    pub role: Role,
}

impl Identity {
    pub fn new(display_name: impl Into<String>, role: Role) -> Self {
        Self {
            display_name: display_name.into(),
            role,
        }
    }

    /// Text shown in the navigation bar.
    pub fn navbar_label(&self) -> String {
        format!("Logged in as: {}", self.display_name)
    }
}
