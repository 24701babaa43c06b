//! Outbound proxying for rewrites that point at a declared backend.
//!
//! This crate provides:
//! - `ProxyRequest` - Upstream request with `Host` and `X-Forwarded-*` headers
//! - `Fetcher` - Seam over the platform's outbound `send`
//! - `ProxyClient` - Forward an adapted request and copy the upstream reply back
//! - `TimeoutConfig` - Deadline around the upstream round trip

mod fetcher;
mod proxy;
mod timeout;

pub use fetcher::*;
pub use proxy::*;
pub use timeout::*;
