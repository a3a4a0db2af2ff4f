//! Data models for the dashboard session.
//!
//! - `Role`: access level carried in the credential's `role` claim
//! - `Identity`: display name and role decoded from a credential

pub mod identity;

pub use identity::{Identity, Role};
