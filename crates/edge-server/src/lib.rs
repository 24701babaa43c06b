//! Server orchestrator for the edge rendering bridge.
//!
//! This crate provides:
//! - `Server` - Per-process orchestrator: memoised build data, route table, error pages
//! - `PageLoader` - Resolve pages through the manifests and load their components
//! - `Renderer` - Seam to the rendering engine, returning `RenderResult` payloads
//! - `serve_static` / `send_render_result` - Static files and rendered payloads with ETags
//! - `handle_http` - Buffered entry point for the platform's HTTP component

mod api;
mod compress;
mod error;
mod loader;
mod page_path;
mod payload;
mod platform;
mod render;
mod routes;
mod server;
mod static_files;

pub use api::*;
pub use compress::*;
pub use error::*;
pub use loader::*;
pub use page_path::*;
pub use payload::*;
pub use platform::*;
pub use render::*;
pub use server::*;
pub use static_files::*;
