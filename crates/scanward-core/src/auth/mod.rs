//! Authentication module for the dashboard session.
//!
//! This module provides:
//! - `SessionStore`: owner of the session state (restore, establish, clear)
//! - `Credential` and `decode_identity`: claim decoding for bearer credentials
//! - `SessionStorage`: durable persistence backends (file, keyring, memory)
//!
//! Identities decoded here are advisory. They drive what the UI renders;
//! the backend still authorizes every request on its own.

pub mod error;
pub mod session;
pub mod storage;
pub mod token;

pub use error::{AuthError, INVALID_SESSION_MESSAGE};
pub use session::{SessionState, SessionStore};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageKind, SESSION_KEY};
pub use token::{decode_identity, Credential};
