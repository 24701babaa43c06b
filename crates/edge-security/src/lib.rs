//! Security boundaries of the edge rendering bridge.
//!
//! This crate provides:
//! - `BackendRegistry` - Declared proxy backends; resolution never falls back to an open fetch
//! - `ServeablePaths` - Enumerated static files and traversal-safe `is_serveable_url`
//! - `ProxyLimits` - Body size and timeout bounds for proxied requests
//!
//! # Example
//!
//! ```ignore
//! use edge_security::BackendRegistry;
//!
//! let registry = BackendRegistry::new()
//!     .declare("httpbin", "https://httpbin.org/anything/");
//! let backend = registry.resolve("https://httpbin.org/anything/foo")?;
//! assert_eq!(backend.target, "/foo");
//! ```

mod backend;
mod limits;
mod path;

pub use backend::*;
pub use limits::*;
pub use path::*;
