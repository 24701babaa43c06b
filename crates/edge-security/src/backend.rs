//! Declared proxy backends.
//!
//! Outbound proxying may only target a backend declared at startup. A url
//! that no backend covers is a hard error; there is no unrestricted fetch.

use edge_core::BackendSpec;
use indexmap::IndexMap;
use url::{Position, Url};

/// Result type for backend resolution.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors from backend resolution.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend not found for '{0}'")]
    NotDeclared(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolved backend for a proxied url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    /// Backend name as declared.
    pub name: String,
    /// Declared url, normalized with a trailing `/`.
    pub url: String,
    /// Path and query to request on the backend, starting with `/`.
    pub target: String,
}

/// Backends in declaration order.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: IndexMap<String, String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured backend declarations.
    pub fn from_config(backends: &IndexMap<String, BackendSpec>) -> Self {
        backends
            .iter()
            .fold(Self::new(), |registry, (name, spec)| {
                registry.declare(name.as_str(), spec.url())
            })
    }

    /// Declare a backend by name and base url.
    pub fn declare(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.backends.insert(name.into(), url);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Find the backend covering `target_url`.
    ///
    /// When the url has no explicit port, the form with the scheme's default
    /// port is tried first, then the url as given.
    pub fn resolve(&self, target_url: &str) -> BackendResult<BackendInfo> {
        let parsed = Url::parse(target_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{target_url}: {e}")))?;

        if parsed.port().is_none() {
            if let Some(with_port) = with_default_port(&parsed) {
                if let Some(info) = self.find(&with_port) {
                    return Ok(info);
                }
            }
        }

        self.find(target_url)
            .ok_or_else(|| BackendError::NotDeclared(target_url.to_string()))
    }

    fn find(&self, url: &str) -> Option<BackendInfo> {
        self.backends.iter().find_map(|(name, base)| {
            url.strip_prefix(base.as_str()).map(|rest| BackendInfo {
                name: name.clone(),
                url: base.clone(),
                target: format!("/{rest}"),
            })
        })
    }
}

/// Render `url` with the scheme's default port written out.
fn with_default_port(url: &Url) -> Option<String> {
    let port = match url.scheme() {
        "https" => 443,
        _ => 80,
    };
    let host = url.host_str()?;
    let userinfo = &url[Position::BeforeUsername..Position::BeforeHost];
    Some(format!(
        "{}://{}{}:{}{}",
        url.scheme(),
        userinfo,
        host,
        port,
        &url[Position::BeforePath..]
    ))
}
