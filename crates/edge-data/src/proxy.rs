//! Forwarding a request to a declared backend.

use std::sync::Arc;

use bytes::Bytes;
use edge_core::{
    BodyWriter, HeaderAccess, HeaderStore, RequestAdapter, ResponseAdapter, StatusHolder,
};
use edge_security::{BackendInfo, BackendRegistry, ProxyLimits};
use url::{Position, Url};

use crate::{default_timer, with_timeout, FetchError, Fetcher, TimeoutConfig, Timer};

/// Upstream headers that describe the hop, not the payload.
const HOP_HEADERS: &[&str] = &["connection", "keep-alive", "transfer-encoding", "upgrade"];

/// Cache behaviour requested for the upstream fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheOverride {
    /// Bypass any cache between this hop and the backend.
    #[default]
    Pass,
    /// Let the platform decide.
    Default,
}

/// Request sent upstream for one proxied rewrite.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub backend: BackendInfo,
    pub method: http::Method,
    pub headers: HeaderStore,
    pub body: Bytes,
    pub cache: CacheOverride,
}

impl ProxyRequest {
    /// Build the upstream request for `req`.
    ///
    /// Only `Host` and the `X-Forwarded-*` chain are sent. Each forwarded
    /// header carries the incoming values, comma-joined, followed by this
    /// hop's value.
    pub fn new(
        req: &RequestAdapter,
        backend: BackendInfo,
        body: Bytes,
    ) -> Result<Self, FetchError> {
        let base = Url::parse(&backend.url).map_err(|e| FetchError::Request(e.to_string()))?;
        let host = &base[Position::BeforeHost..Position::AfterPort];

        let mut headers = HeaderStore::new();
        headers.set("host", host);

        let port = req.port().unwrap_or(443).to_string();
        let hop = [
            ("for", req.client().address.clone()),
            ("port", port),
            ("proto", "https".to_string()),
        ];
        for (suffix, value) in hop {
            let name = format!("x-forwarded-{suffix}");
            let mut chain = req.header_values(&name).to_vec();
            chain.push(value);
            headers.set(&name, chain.join(","));
        }

        Ok(Self {
            backend,
            method: req.method().clone(),
            headers,
            body,
            cache: CacheOverride::Pass,
        })
    }

    /// Absolute upstream url: the declared backend url followed by the target.
    pub fn upstream_url(&self) -> String {
        let target = self.backend.target.trim_start_matches('/');
        format!("{}{}", self.backend.url, target)
    }

    pub fn into_http(self) -> Result<http::Request<Bytes>, FetchError> {
        let mut builder = http::Request::builder()
            .method(self.method.clone())
            .uri(self.upstream_url());
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers.to_header_map();
        }
        builder
            .body(self.body)
            .map_err(|e| FetchError::Request(e.to_string()))
    }
}

/// Forwards requests to declared backends and copies the replies back.
#[derive(Clone)]
pub struct ProxyClient {
    backends: BackendRegistry,
    fetcher: Arc<dyn Fetcher>,
    limits: ProxyLimits,
    timer: Arc<dyn Timer>,
}

impl ProxyClient {
    pub fn new(backends: BackendRegistry, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            backends,
            fetcher,
            limits: ProxyLimits::default(),
            timer: default_timer(),
        }
    }

    pub fn with_limits(mut self, limits: ProxyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn limits(&self) -> &ProxyLimits {
        &self.limits
    }

    /// Proxy `req` to the backend covering `target_url` and send the
    /// upstream status, headers and body on `res`.
    ///
    /// An undeclared target is an error; there is no open fetch.
    pub async fn forward(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        target_url: &str,
    ) -> Result<(), FetchError> {
        let backend = self.backends.resolve(target_url)?;
        let body = req.take_body()?;
        self.limits.check_body(body.len())?;

        let proxy = ProxyRequest::new(req, backend, body)?;
        tracing::debug!(
            request_id = %req.id(),
            backend = %proxy.backend.name,
            target = %proxy.backend.target,
            "Proxying request"
        );

        let upstream = with_timeout(
            self.timer.as_ref(),
            TimeoutConfig::from(&self.limits),
            self.fetcher.fetch(proxy.into_http()?),
        )
        .await??;

        copy_upstream(res, upstream)
    }
}

impl std::fmt::Debug for ProxyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyClient")
            .field("backends", &self.backends)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

fn copy_upstream(res: &ResponseAdapter, upstream: http::Response<Bytes>) -> Result<(), FetchError> {
    let (parts, body) = upstream.into_parts();
    res.set_status(parts.status.as_u16())?;
    for (name, value) in parts.headers.iter() {
        if HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        res.append_header(name.as_str(), value)?;
    }
    res.body(body)?;
    res.send();
    Ok(())
}
