//! Contract with the page renderer.
//!
//! Rendering itself is opaque to the server. The renderer receives the
//! loaded components and returns either a complete payload or a stream;
//! the server takes care of sending it.

use async_trait::async_trait;
use bytes::Bytes;
use edge_cache::PayloadCachePolicy;
use edge_core::{BodyError, Query, RequestAdapter, ResponseAdapter};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::LoadedComponents;

/// Renderer failures.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    /// The page asked for a 404.
    #[error("Page not found")]
    NotFound,
    /// A dynamic page has no pre-rendered fallback for this path.
    #[error("No fallback for page")]
    NoFallback,
    #[error("Render failed: {0}")]
    Failed(String),
}

/// Kind of payload, which decides the default `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Html,
    Json,
}

impl PayloadType {
    pub fn content_type(self) -> &'static str {
        match self {
            PayloadType::Html => "text/html; charset=utf-8",
            PayloadType::Json => "application/json",
        }
    }
}

enum Body {
    Static(String),
    Dynamic(BoxStream<'static, Result<Bytes, BodyError>>),
}

/// Output of a render.
pub struct RenderResult {
    body: Body,
    /// Cache directives for the payload.
    pub cache: Option<PayloadCachePolicy>,
}

impl RenderResult {
    /// A complete payload.
    pub fn from_string(payload: impl Into<String>) -> Self {
        Self {
            body: Body::Static(payload.into()),
            cache: None,
        }
    }

    /// A payload produced while the response is in flight.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BodyError>> + Send + 'static,
    {
        Self {
            body: Body::Dynamic(stream.boxed()),
            cache: None,
        }
    }

    pub fn with_cache(mut self, policy: PayloadCachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.body, Body::Dynamic(_))
    }

    /// The complete payload; `None` for streamed results.
    pub fn to_unchunked_string(&self) -> Option<&str> {
        match &self.body {
            Body::Static(s) => Some(s),
            Body::Dynamic(_) => None,
        }
    }

    /// The stream of a dynamic result.
    pub fn into_stream(self) -> Option<BoxStream<'static, Result<Bytes, BodyError>>> {
        match self.body {
            Body::Static(_) => None,
            Body::Dynamic(stream) => Some(stream),
        }
    }
}

impl std::fmt::Debug for RenderResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderResult")
            .field("dynamic", &self.is_dynamic())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Inputs of one render besides the request itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderOpts<'a> {
    pub components: &'a LoadedComponents,
    pub build_id: &'a str,
    pub base_path: &'a str,
    pub locale: Option<&'a str>,
    pub default_locale: Option<&'a str>,
    pub locales: &'a [String],
    /// Render the JSON data of the page instead of HTML.
    pub is_data_request: bool,
    /// Status of the response, non-200 for error pages.
    pub status: u16,
    /// Message of the error being rendered, for error pages.
    pub error: Option<&'a str>,
}

/// Page renderer.
///
/// `Ok(None)` means the renderer already produced the response itself.
#[async_trait(?Send)]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        pathname: &str,
        query: &Query,
        opts: &RenderOpts<'_>,
    ) -> Result<Option<RenderResult>, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_result() {
        let result = RenderResult::from_string("<p>hi</p>");
        assert!(!result.is_dynamic());
        assert_eq!(result.to_unchunked_string(), Some("<p>hi</p>"));
        assert!(result.into_stream().is_none());
    }

    #[tokio::test]
    async fn test_dynamic_result() {
        let chunks = futures::stream::iter(vec![Ok(Bytes::from("a")), Ok(Bytes::from("b"))]);
        let result =
            RenderResult::from_stream(chunks).with_cache(PayloadCachePolicy::revalidate(5));
        assert!(result.is_dynamic());
        assert!(result.to_unchunked_string().is_none());
        assert_eq!(result.cache, Some(PayloadCachePolicy::revalidate(5)));
        let collected: Vec<_> = result.into_stream().unwrap().collect().await;
        assert_eq!(collected.len(), 2);
    }
}
