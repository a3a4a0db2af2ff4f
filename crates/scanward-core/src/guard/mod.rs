//! Route gating.
//!
//! `evaluate` is the whole policy: a pure function of the session state and
//! the role a view needs. `RouteGuard` re-reads the store on every check so
//! a logout during a render is seen by the next decision.

pub mod navigator;
pub mod route;

pub use navigator::Navigator;
pub use route::Route;

use serde::{Deserialize, Serialize};

use crate::auth::{SessionState, SessionStore};
use crate::models::Role;

/// What the router should do with a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum GuardDecision {
    /// Render the requested view unmodified.
    Render,
    /// Session still restoring; show a placeholder, do not redirect.
    Loading,
    Redirect(Route),
}

/// Decide whether a view requiring `required` may render in `state`.
pub fn evaluate(state: &SessionState, required: Role) -> GuardDecision {
    match state {
        SessionState::Restoring => GuardDecision::Loading,
        SessionState::Unauthenticated => GuardDecision::Redirect(Route::Login),
        // Wrong role is "wrong place", not an attack: send to the neutral view
        SessionState::Authenticated { identity, .. } if identity.role != required => {
            GuardDecision::Redirect(Route::Home)
        }
        SessionState::Authenticated { .. } => GuardDecision::Render,
    }
}

/// Guard bound to a session store.
#[derive(Clone)]
pub struct RouteGuard {
    session: SessionStore,
}

impl RouteGuard {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }

    pub fn check(&self, required: Role) -> GuardDecision {
        evaluate(&self.session.state(), required)
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }
}
