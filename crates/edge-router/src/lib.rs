//! Routing for the edge rendering bridge.
//!
//! This crate provides:
//! - `PathMatcher` - `/:param`, `/:param?`, `/:param*`, `/:param+` patterns
//! - `DynamicRoute` - Page routes such as `/post/[id]` and `/docs/[[...slug]]`
//! - `HeaderRoute` / `RedirectRoute` / `RewriteRoute` - Custom rules from the routes manifest
//! - `Router` - Ordered route table evaluated once per request

mod custom;
mod destination;
mod dynamic;
mod error;
mod has;
pub mod i18n;
mod matcher;
mod route;
mod router;

pub use custom::*;
pub use destination::*;
pub use dynamic::*;
pub use error::*;
pub use has::*;
pub use matcher::*;
pub use route::*;
pub use router::*;
