//! Build-time asset bundle and the virtual filesystem over it.
//!
//! This crate provides:
//! - `Asset` / `AssetContent` - One file from the build output
//! - `AssetStore` - Immutable, insertion-ordered path -> asset map
//! - `VirtualFs` - Filesystem-style accessors resolved against the store
//! - Typed manifests (`PagesManifest`, `RoutesManifest`, `PrerenderManifest`, ...)

mod asset;
mod error;
pub mod manifest;
mod store;
mod vfs;

pub use asset::*;
pub use error::*;
pub use manifest::{
    BuildManifest, DynamicRouteEntry, HeaderEntry, HeaderRule, InitialRevalidate, PagesManifest,
    PrerenderDynamicRoute, PrerenderFallback, PrerenderManifest, PrerenderRoute, RedirectRule,
    RewriteRule, Rewrites, RouteHas, RoutesManifest,
};
pub use store::*;
pub use vfs::*;
