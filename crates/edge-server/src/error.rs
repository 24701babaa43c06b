//! Error taxonomy of the server and its status classification.

use std::time::Duration;

use edge_assets::AssetError;
use edge_cache::CachePolicyError;
use edge_core::{BodyError, ConfigError, ModuleError, RequestError, ResponseError};
use edge_data::FetchError;
use edge_router::RouteError;

use crate::RenderError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Everything that can go wrong while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Cannot find module for page: {0}")]
    PageNotFound(String),

    #[error("Failed to load static file for page {page}: {message}")]
    MissingStaticPage { page: String, message: String },

    #[error("Could not find a production build in the '{0}' directory")]
    NoBuild(String),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Body(#[from] BodyError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    CachePolicy(#[from] CachePolicyError),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("Upgrade requests are not supported")]
    UpgradeNotSupported,

    #[error("Render timed out after {0:?}")]
    RenderTimeout(Duration),

    #[error("Compression failed: {0}")]
    Compress(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status the error is rendered with.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::Asset(AssetError::NotFound(_)) => 404,
            ServerError::PageNotFound(_) => 404,
            ServerError::Render(RenderError::NotFound | RenderError::NoFallback) => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::Fetch(FetchError::BodyTooLarge(_)) => 413,
            ServerError::UpgradeNotSupported => 501,
            _ => 500,
        }
    }

    /// Missing page or asset, answered with the 404 page.
    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }
}
