//! Outbound HTTP seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use edge_core::{RequestError, ResponseError};
use edge_security::{BackendError, LimitError};

use crate::TimeoutError;

/// Errors from a proxied fetch.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    BodyTooLarge(#[from] LimitError),

    #[error("Request body unavailable: {0}")]
    Body(#[from] RequestError),

    #[error("Invalid upstream request: {0}")]
    Request(String),

    #[error("Upstream connection failed: {0}")]
    Connection(String),

    #[error("Upstream timeout after {0:?}")]
    Timeout(Duration),

    #[error("Failed to copy upstream response: {0}")]
    Response(#[from] ResponseError),
}

impl From<TimeoutError> for FetchError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Total(after) => FetchError::Timeout(after),
        }
    }
}

/// Sends a fully buffered request and returns the fully buffered reply.
#[async_trait(?Send)]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<Bytes>, FetchError>;
}

/// Fetcher backed by Spin's outbound HTTP.
///
/// The upstream host must be listed in the component's
/// `allowed_outbound_hosts`. Spin has no outbound cache, so every request
/// already behaves as a cache pass.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinFetcher;

#[cfg(target_arch = "wasm32")]
#[async_trait(?Send)]
impl Fetcher for SpinFetcher {
    async fn fetch(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<Bytes>, FetchError> {
        let request = request.map(|body| body.to_vec());
        let response: http::Response<Vec<u8>> = spin_sdk::http::send(request)
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        Ok(response.map(Bytes::from))
    }
}

/// Fetcher used where no outbound HTTP is available. Every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

#[async_trait(?Send)]
impl Fetcher for NoFetcher {
    async fn fetch(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<Bytes>, FetchError> {
        Err(FetchError::Connection(format!(
            "no outbound HTTP available for {}",
            request.uri()
        )))
    }
}

/// Fetcher for the current target.
pub fn default_fetcher() -> Arc<dyn Fetcher> {
    #[cfg(target_arch = "wasm32")]
    {
        Arc::new(SpinFetcher)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Arc::new(NoFetcher)
    }
}
