//! Dashboard routes and the role each one requires.

use serde::{Deserialize, Serialize};

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum Route {
    /// Neutral landing view, open to everyone.
    Home,
    Login,
    AdminDashboard,
    AdminUsers,
    AdminRetrain,
    UserDashboard,
    ScanPdf,
    ScanUrl,
    ScanQr,
    ScanLogs,
    ScanHistory,
}

impl Route {
    pub const ALL: [Route; 11] = [
        Route::Home,
        Route::Login,
        Route::AdminDashboard,
        Route::AdminUsers,
        Route::AdminRetrain,
        Route::UserDashboard,
        Route::ScanPdf,
        Route::ScanUrl,
        Route::ScanQr,
        Route::ScanLogs,
        Route::ScanHistory,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::AdminDashboard => "/admin",
            Route::AdminUsers => "/admin/users",
            Route::AdminRetrain => "/admin/retrain",
            Route::UserDashboard => "/user",
            Route::ScanPdf => "/scan/pdf",
            Route::ScanUrl => "/scan/url",
            Route::ScanQr => "/scan/qr",
            Route::ScanLogs => "/scan/logs",
            Route::ScanHistory => "/scan/history",
        }
    }

    /// Match a path, tolerating a missing leading or a trailing slash.
    /// Query strings and fragments are ignored.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim().trim_matches('/');
        Self::ALL
            .into_iter()
            .find(|route| route.path().trim_start_matches('/') == trimmed)
    }

    /// Role needed to render this route; `None` for public routes.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::Home | Route::Login => None,
            Route::AdminDashboard | Route::AdminUsers | Route::AdminRetrain => Some(Role::Admin),
            Route::UserDashboard
            | Route::ScanPdf
            | Route::ScanUrl
            | Route::ScanQr
            | Route::ScanLogs
            | Route::ScanHistory => Some(Role::User),
        }
    }

    /// Where a freshly logged-in user of `role` is sent.
    pub fn landing_for(role: Role) -> Self {
        match role {
            Role::Admin => Route::AdminDashboard,
            Role::User => Route::UserDashboard,
        }
    }
}
