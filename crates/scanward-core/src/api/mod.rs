//! REST API client module for the scanning backend.
//!
//! This module provides the `ApiClient` that every dashboard request goes
//! through. It owns the default headers; the session store installs and
//! removes the bearer `Authorization` header on it.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{login_error_message, ApiError, GENERIC_LOGIN_ERROR};
