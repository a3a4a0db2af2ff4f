//! Path resolution for the front end router.

use tracing::debug;

use super::{GuardDecision, Route, RouteGuard};

/// Outcome of navigating to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    /// Route matched for the requested path, if any.
    pub requested: Option<Route>,
    pub decision: GuardDecision,
}

impl Navigation {
    /// The route that ends up on screen, or `None` while loading.
    pub fn destination(&self) -> Option<Route> {
        match self.decision {
            GuardDecision::Render => self.requested,
            GuardDecision::Redirect(route) => Some(route),
            GuardDecision::Loading => None,
        }
    }
}

/// Maps paths to routes and runs protected ones through the guard.
#[derive(Clone)]
pub struct Navigator {
    guard: RouteGuard,
}

impl Navigator {
    pub fn new(guard: RouteGuard) -> Self {
        Self { guard }
    }

    pub fn resolve(&self, path: &str) -> Navigation {
        let requested = Route::from_path(path);
        let decision = match requested {
            // Unknown paths fall back to the neutral view
            None => GuardDecision::Redirect(Route::Home),
            Some(route) => match route.required_role() {
                None => GuardDecision::Render,
                Some(role) => self.guard.check(role),
            },
        };

        debug!(path, ?requested, ?decision, "Resolved navigation");
        Navigation {
            requested,
            decision,
        }
    }
}
