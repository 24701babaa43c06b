//! Reference workload serving a pre-built site.
//!
//! This workload shows:
//! - Building a `Server` from a bundled asset store and `edge.toml`
//! - Redirects and a proxied rewrite from the routes manifest
//! - Locale-prefixed static pages and public files
//! - Structured logging and lifecycle hooks

mod bundle;
mod renderer;

use std::sync::Arc;

use edge_core::{Lifecycle, LifecyclePhase, ServerConfig};
use edge_observability::{LogFormat, StructuredLogger};
use edge_server::{handle_http, Server, ServerResult};
use spin_sdk::http_component;

pub use bundle::{assets, BUILD_ID};
pub use renderer::ShellRenderer;

const CONFIG: &str = include_str!("../edge.toml");

/// Build the server for the bundled site.
pub fn server() -> ServerResult<Server> {
    let config = ServerConfig::load_str("edge.toml", CONFIG)?;
    let logger = StructuredLogger::new().with_format(LogFormat::Json);
    let lifecycle = Lifecycle::builder()
        .on(LifecyclePhase::Error, 0, |event| {
            tracing::warn!(
                request_id = %event.request_id,
                error = event.error.as_deref().unwrap_or_default(),
                "request error"
            );
        })
        .build();

    Server::builder(config, bundle::assets(), Arc::new(ShellRenderer))
        .logger(logger)
        .lifecycle(lifecycle)
        .build()
}

/// Main HTTP handler. Spin instantiates the component per request, so the
/// server is built here.
#[http_component]
async fn handle(req: http::Request<Vec<u8>>) -> anyhow::Result<http::Response<Vec<u8>>> {
    let server = server()?;
    handle_http(&server, req).await
}
