//! Glue between the platform's HTTP types and [`Server::handle`].
//!
//! ```ignore
//! use spin_sdk::http_component;
//!
//! #[http_component]
//! async fn handle(req: http::Request<Vec<u8>>) -> anyhow::Result<http::Response<Vec<u8>>> {
//!     // Spin instantiates the component per request.
//!     let server = build_server()?;
//!     edge_server::handle_http(&server, req).await
//! }
//! ```

use bytes::Bytes;
use edge_core::ClientInfo;

use crate::Server;

/// Header carrying the client socket address on Spin.
pub const CLIENT_ADDR_HEADER: &str = "spin-client-addr";

/// Client information for a platform request.
pub fn client_info<B>(req: &http::Request<B>) -> ClientInfo {
    req.headers()
        .get(CLIENT_ADDR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ClientInfo::from_socket_addr)
        .unwrap_or_default()
}

/// Handle a fully buffered platform request and buffer the response.
///
/// Streamed bodies are collected here; the component model response is
/// written in one piece.
pub async fn handle_http(
    server: &Server,
    req: http::Request<Vec<u8>>,
) -> anyhow::Result<http::Response<Vec<u8>>> {
    let client = client_info(&req);
    let response = server.handle(req.map(Bytes::from), client).await?;
    let (parts, body) = response.into_parts();
    let body = body.collect().await?;
    Ok(http::Response::from_parts(parts, body.to_vec()))
}
