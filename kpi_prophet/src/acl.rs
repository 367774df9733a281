//! Access control and navigation hooks for hosting applications

use axum::http::HeaderMap;

/// ACL resource guarding every forecast page
pub const ACL_RESOURCE: &str = "Forecasts";

/// Decides whether a request may see a resource.
///
/// The hosting application supplies its own implementation; the headers carry
/// whatever identifies the user there.
pub trait PermissionCheck: Send + Sync {
    fn has_permission(&self, resource: &str, headers: &HeaderMap) -> bool;
}

/// Lets every request through
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn has_permission(&self, _resource: &str, _headers: &HeaderMap) -> bool {
        true
    }
}

/// Entry of the hosting application's navigation menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    pub label: &'static str,
    pub uri: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

pub fn navigation_entry() -> NavigationEntry {
    NavigationEntry {
        label: "Forecasts",
        uri: "/forecasts/",
        icon: "fast-forward",
        description: "KPI forecasting",
    }
}
