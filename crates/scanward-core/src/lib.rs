//! Session and access control core for the scanward malware analysis dashboard.
//!
//! - `auth`: credential decoding, persistence and the `SessionStore`
//! - `guard`: role-based route gating and path resolution
//! - `api`: the HTTP client whose bearer header the session manages
//! - `config`: on-disk configuration with environment overrides
//! - `models`: `Role` and `Identity`

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, SessionState, SessionStore};
pub use config::Config;
pub use guard::{evaluate, GuardDecision, Navigator, Route, RouteGuard};
pub use models::{Identity, Role};
