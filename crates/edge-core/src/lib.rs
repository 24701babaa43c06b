//! Core abstractions for the edge rendering bridge.
//!
//! This crate provides the fundamental types and traits:
//! - `RequestAdapter` - Node-style view over the immutable platform request
//! - `ResponseAdapter` / `PendingResponse` - Open -> Sent -> Materialized response
//! - `HeaderStore` - Case-insensitive header multimap (`Set-Cookie` as a true list)
//! - `PageModule` - Contract for pre-loaded compiled page and API modules
//! - `Lifecycle` - Ordered per-phase hooks
//! - `ServerConfig` - Deployment configuration

mod body;
mod config;
mod context;
mod headers;
mod lifecycle;
mod module;
mod query;
mod request;
mod response;

pub use body::*;
pub use config::*;
pub use context::*;
pub use headers::*;
pub use lifecycle::*;
pub use module::*;
pub use query::*;
pub use request::*;
pub use response::*;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
