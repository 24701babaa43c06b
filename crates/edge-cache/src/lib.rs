//! Caching primitives for the edge rendering bridge.
//!
//! This crate provides:
//! - `generate_etag` - Weak-collision-free entity tags for payloads and static files
//! - `fresh` - Conditional-GET freshness check (`If-None-Match` / `If-Modified-Since`)
//! - `PayloadCachePolicy` - Revalidate-driven `Cache-Control` for rendered payloads
//! - `IMMUTABLE_CACHE_CONTROL` - Header for fingerprinted build assets
//!
//! # Example
//!
//! ```ignore
//! use edge_cache::{generate_etag, PayloadCachePolicy};
//!
//! let etag = generate_etag(b"<html></html>");
//! let cache_control = PayloadCachePolicy::revalidate(60).cache_control(None)?;
//! assert_eq!(cache_control.as_deref(), Some("s-maxage=60, stale-while-revalidate"));
//! ```

mod etag;
mod policy;

pub use etag::*;
pub use policy::*;
