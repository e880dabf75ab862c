//! Navigation guard
//!
//! A pure decision over route metadata and session state. It never touches
//! the network or mutates the session.

use crate::claims::PermissionRequirement;
use crate::routes::RouteTable;
use crate::session::SessionView;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/";

/// Access requirements a route declares
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub permission: PermissionRequirement,
}

impl RouteMeta {
    pub fn public() -> Self {
        Self {
            public: true,
            ..Self::default()
        }
    }

    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            ..Self::default()
        }
    }

    pub fn with_permission(permission: impl Into<PermissionRequirement>) -> Self {
        Self {
            requires_auth: true,
            permission: permission.into(),
            ..Self::default()
        }
    }
}

/// Where a blocked navigation is sent instead
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Not signed in: go to login, then come back to `return_to`
    Login { path: String, return_to: String },
    /// Signed in but lacking permission
    Landing { path: String },
}

impl Redirect {
    /// Location to navigate to, e.g. `/login?redirect=%2Faudit`
    pub fn target(&self) -> String {
        match self {
            Redirect::Login { path, return_to } => {
                format!("{path}?redirect={}", urlencoding::encode(return_to))
            }
            Redirect::Landing { path } => path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Redirect),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    landing_path: String,
    routes: RouteTable,
}

impl RouteGuard {
    pub fn new(routes: RouteTable) -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            routes,
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide a navigation to `target` against the given route metadata.
    ///
    /// `target` is the full intended location (path plus query) and is only
    /// used as the return target of a login redirect.
    pub fn check<S>(&self, meta: &RouteMeta, target: &str, session: &S) -> GuardDecision
    where
        S: SessionView + ?Sized,
    {
        if meta.public {
            return GuardDecision::Allow;
        }

        if meta.requires_auth && !session.is_authenticated() {
            return GuardDecision::Redirect(Redirect::Login {
                path: self.login_path.clone(),
                return_to: target.to_string(),
            });
        }

        if !meta.permission.is_empty() && !session.has_permission(&meta.permission) {
            return GuardDecision::Redirect(Redirect::Landing {
                path: self.landing_path.clone(),
            });
        }

        GuardDecision::Allow
    }

    /// Resolve `full_path` in the route table and decide the navigation
    pub fn navigate<S: SessionView + ?Sized>(&self, full_path: &str, session: &S) -> GuardDecision {
        let route = self.routes.resolve(full_path);
        let decision = self.check(&route.meta, full_path, session);
        tracing::debug!(path = %full_path, route = %route.name, ?decision, "Navigation checked");
        decision
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(RouteTable::asset_console())
    }
}
