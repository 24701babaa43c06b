//! Typed build manifests and their conventional locations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// File names under the build output directory.
pub mod paths {
    pub const BUILD_ID: &str = "BUILD_ID";
    pub const ROUTES_MANIFEST: &str = "routes-manifest.json";
    pub const PRERENDER_MANIFEST: &str = "prerender-manifest.json";
    pub const BUILD_MANIFEST: &str = "build-manifest.json";
    pub const REACT_LOADABLE_MANIFEST: &str = "react-loadable-manifest.json";
    /// Relative to the server directory.
    pub const PAGES_MANIFEST: &str = "pages-manifest.json";
    /// Relative to the server directory.
    pub const APP_PATHS_MANIFEST: &str = "app-paths-manifest.json";
    /// Relative to the server directory.
    pub const FONT_MANIFEST: &str = "font-manifest.json";
    /// Relative to the server directory.
    pub const FLIGHT_MANIFEST: &str = "flight-manifest.json";
    /// Client assets directory.
    pub const STATIC_DIR: &str = "static";
    /// Public folder under the project root.
    pub const PUBLIC_DIR: &str = "public";
    /// Suffix of the client entry emitted for server component pages.
    pub const CLIENT_SSR_ENTRY_SUFFIX: &str = ".__sc_client__";
    /// Webpack runtime directory under `static/`.
    pub const STATIC_RUNTIME: &str = "runtime";
}

/// Page -> compiled file, relative to the server directory.
pub type PagesManifest = IndexMap<String, String>;

/// Condition on a custom route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteHas {
    Header {
        key: String,
        #[serde(default)]
        value: Option<String>,
    },
    Cookie {
        key: String,
        #[serde(default)]
        value: Option<String>,
    },
    Query {
        key: String,
        #[serde(default)]
        value: Option<String>,
    },
    Host {
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

/// `headers()` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderRule {
    pub source: String,
    pub headers: Vec<HeaderEntry>,
    #[serde(default)]
    pub has: Vec<RouteHas>,
    #[serde(default)]
    pub missing: Vec<RouteHas>,
    /// `Some(false)` opts the rule out of the base path.
    #[serde(default)]
    pub base_path: Option<bool>,
    #[serde(default)]
    pub locale: Option<bool>,
}

/// `redirects()` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectRule {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub permanent: Option<bool>,
    #[serde(default)]
    pub has: Vec<RouteHas>,
    #[serde(default)]
    pub missing: Vec<RouteHas>,
    #[serde(default)]
    pub base_path: Option<bool>,
    #[serde(default)]
    pub locale: Option<bool>,
    /// Generated by the framework (e.g. trailing-slash redirects).
    #[serde(default)]
    pub internal: bool,
}

impl RedirectRule {
    /// Explicit status, else 308 for permanent and 307 otherwise.
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(if self.permanent.unwrap_or(false) {
            308
        } else {
            307
        })
    }
}

/// `rewrites()` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRule {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub has: Vec<RouteHas>,
    #[serde(default)]
    pub missing: Vec<RouteHas>,
    #[serde(default)]
    pub base_path: Option<bool>,
    #[serde(default)]
    pub locale: Option<bool>,
}

/// Rewrites grouped by the phase they run in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewrites {
    #[serde(default)]
    pub before_files: Vec<RewriteRule>,
    #[serde(default)]
    pub after_files: Vec<RewriteRule>,
    #[serde(default)]
    pub fallback: Vec<RewriteRule>,
}

/// Rewrites are stored as a plain list when the config returned one.
#[derive(Deserialize)]
#[serde(untagged)]
enum RewritesRepr {
    List(Vec<RewriteRule>),
    Phased(Rewrites),
}

impl From<RewritesRepr> for Rewrites {
    fn from(repr: RewritesRepr) -> Self {
        match repr {
            RewritesRepr::List(after_files) => Rewrites {
                after_files,
                ..Default::default()
            },
            RewritesRepr::Phased(r) => r,
        }
    }
}

fn deserialize_rewrites<'de, D>(deserializer: D) -> Result<Rewrites, D::Error>
where
    D: serde::Deserializer<'de>,
{
    RewritesRepr::deserialize(deserializer).map(Into::into)
}

/// Dynamic page listed in the routes manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicRouteEntry {
    pub page: String,
    #[serde(default)]
    pub regex: Option<String>,
}

/// `routes-manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutesManifest {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub pages404: bool,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub headers: Vec<HeaderRule>,
    #[serde(default)]
    pub redirects: Vec<RedirectRule>,
    #[serde(default, deserialize_with = "deserialize_rewrites")]
    pub rewrites: Rewrites,
    #[serde(default)]
    pub dynamic_routes: Vec<DynamicRouteEntry>,
}

/// `initialRevalidateSeconds`: a number of seconds, or `false` for never.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialRevalidate {
    Seconds(u64),
    Flag(bool),
}

impl InitialRevalidate {
    /// Seconds until revalidation, `None` for never.
    pub fn seconds(self) -> Option<u64> {
        match self {
            InitialRevalidate::Seconds(s) => Some(s),
            InitialRevalidate::Flag(_) => None,
        }
    }
}

/// Pre-rendered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderRoute {
    pub initial_revalidate_seconds: InitialRevalidate,
    #[serde(default)]
    pub src_route: Option<String>,
    pub data_route: String,
}

/// What a dynamic pre-rendered page answers for a path the build did not
/// emit. `null` in the manifest renders on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrerenderFallback {
    /// Path of the fallback shell, or `false` for no fallback.
    Shell(String),
    Enabled(bool),
}

/// Dynamic page with pre-rendered paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderDynamicRoute {
    #[serde(default)]
    pub route_regex: Option<String>,
    #[serde(default)]
    pub data_route: Option<String>,
    #[serde(default)]
    pub fallback: Option<PrerenderFallback>,
}

impl PrerenderDynamicRoute {
    /// Paths outside the pre-rendered set are not found.
    pub fn has_no_fallback(&self) -> bool {
        self.fallback == Some(PrerenderFallback::Enabled(false))
    }

    /// Unknown paths are rendered on demand instead of served a shell.
    pub fn is_blocking(&self) -> bool {
        self.fallback.is_none()
    }
}

/// `prerender-manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderManifest {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub routes: IndexMap<String, PrerenderRoute>,
    #[serde(default)]
    pub dynamic_routes: IndexMap<String, PrerenderDynamicRoute>,
    #[serde(default)]
    pub not_found_routes: Vec<String>,
    #[serde(default)]
    pub preview: serde_json::Value,
}

impl PrerenderManifest {
    /// Whether the build recorded `path` as not found.
    pub fn is_not_found(&self, path: &str) -> bool {
        self.not_found_routes.iter().any(|route| route == path)
    }
}

/// `build-manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    #[serde(default)]
    pub polyfill_files: Vec<String>,
    #[serde(default)]
    pub low_priority_files: Vec<String>,
    #[serde(default)]
    pub root_main_files: Vec<String>,
    #[serde(default)]
    pub pages: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub amp_first_pages: Vec<String>,
}
