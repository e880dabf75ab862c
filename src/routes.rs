//! Route table for the asset console

use crate::guard::RouteMeta;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    pub path: String,
    pub name: String,
    pub meta: RouteMeta,
}

impl RouteDefinition {
    pub fn new(path: impl Into<String>, name: impl Into<String>, meta: RouteMeta) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            meta,
        }
    }
}

/// Ordered list of routes plus the catch-all used for unknown paths
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
    fallback: RouteDefinition,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDefinition>, fallback: RouteDefinition) -> Self {
        Self { routes, fallback }
    }

    /// Routes of the asset management console
    pub fn asset_console() -> Self {
        let guarded = |path: &str, name: &str, permission: &str| {
            RouteDefinition::new(path, name, RouteMeta::with_permission(permission))
        };

        let routes = vec![
            RouteDefinition::new("/login", "Login", RouteMeta::public()),
            RouteDefinition::new("/", "Dashboard", RouteMeta::authenticated()),
            guarded("/requests", "AssetRequests", "asset:view"),
            guarded("/inventory", "Inventory", "asset:stockin"),
            guarded("/system/users", "SystemUsers", "user:manage"),
            guarded("/system/roles", "SystemRoles", "role:manage"),
            guarded("/system/departments", "SystemDepartments", "asset:admin"),
            guarded("/system/asset-types", "SystemAssetTypes", "asset:admin"),
            guarded("/system/reminder-email", "ReminderSettings", "asset:admin"),
            guarded("/audit", "AuditLogs", "audit:view"),
            RouteDefinition::new("/profile", "Profile", RouteMeta::authenticated()),
        ];
        let fallback = RouteDefinition::new("/:pathMatch(.*)*", "NotFound", RouteMeta::public());
        Self::new(routes, fallback)
    }

    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    pub fn by_name(&self, name: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Match a location (query and fragment ignored, trailing slash tolerated)
    pub fn resolve(&self, full_path: &str) -> &RouteDefinition {
        let path = strip_path(full_path);
        self.routes.iter().find(|r| r.path == path).unwrap_or(&self.fallback)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::asset_console()
    }
}

fn strip_path(full_path: &str) -> &str {
    let end = full_path.find(['?', '#']).unwrap_or(full_path.len());
    let path = &full_path[..end];
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
