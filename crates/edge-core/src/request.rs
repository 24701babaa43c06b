//! Node-style view over the immutable platform request.

use std::sync::Mutex;

use bytes::Bytes;
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

use crate::{lock, ClientInfo, HeaderStore, Query, RequestId, TimingContext};

/// Headers that Node keeps as a single value; duplicates after the first
/// are discarded.
const SINGLETON_HEADERS: &[&str] = &[
    "age",
    "authorization",
    "content-length",
    "content-type",
    "etag",
    "expires",
    "from",
    "host",
    "if-modified-since",
    "if-unmodified-since",
    "last-modified",
    "location",
    "max-forwards",
    "proxy-authorization",
    "referer",
    "retry-after",
    "server",
    "user-agent",
];

/// Request adapter errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Request body already taken")]
    BodyAlreadyTaken,
    #[error("Invalid request url: {0}")]
    InvalidUrl(String),
}

/// Mutable per-request annotations written by the router.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Url as first received, before any rewrite.
    pub init_url: String,
    /// Locale detected for this request.
    pub locale: Option<String>,
    /// Set once the locale prefix has been removed from the pathname.
    pub did_strip_locale: bool,
    /// Set for `/_next/data` requests.
    pub is_data_request: bool,
}

/// Per-request adapter exposing the platform request in the shape the
/// rendering engine expects.
///
/// Headers are flattened to one value per lowercase name. Raw values stay
/// available through [`RequestAdapter::header_values`].
#[derive(Debug)]
pub struct RequestAdapter {
    id: RequestId,
    method: http::Method,
    uri: http::Uri,
    url: Mutex<String>,
    headers: IndexMap<String, String>,
    raw_headers: HeaderStore,
    cookies: IndexMap<String, String>,
    body: Mutex<Option<Bytes>>,
    client: ClientInfo,
    meta: Mutex<RequestMeta>,
    timing: Mutex<TimingContext>,
}

impl RequestAdapter {
    /// Wrap a platform request.
    pub fn from_platform(req: http::Request<Bytes>, client: ClientInfo) -> Self {
        let (parts, body) = req.into_parts();
        let raw_headers = HeaderStore::from_header_map(&parts.headers);
        let headers = flatten_headers(&raw_headers);
        let cookies = headers
            .get("cookie")
            .map(|c| parse_cookies(c))
            .unwrap_or_default();
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Self {
            id: RequestId::generate(),
            method: parts.method,
            uri: parts.uri,
            url: Mutex::new(url.clone()),
            headers,
            raw_headers,
            cookies,
            body: Mutex::new(Some(body)),
            client,
            meta: Mutex::new(RequestMeta {
                init_url: url,
                ..Default::default()
            }),
            timing: Mutex::new(TimingContext::new()),
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// Current url (path and query), reflecting rewrites.
    pub fn url(&self) -> String {
        lock(&self.url).clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        *lock(&self.url) = url.into();
    }

    /// Pathname of the current url.
    pub fn pathname(&self) -> String {
        let url = self.url();
        url.split('?').next().unwrap_or("/").to_string()
    }

    /// Parsed query of the current url.
    pub fn query(&self) -> Query {
        let url = self.url();
        url.split_once('?')
            .map(|(_, q)| Query::parse(q))
            .unwrap_or_default()
    }

    /// Flattened headers, keyed by lowercase name.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Every raw value received for `name`, in arrival order.
    pub fn header_values(&self, name: &str) -> &[String] {
        self.raw_headers.get_all(name)
    }

    pub fn raw_headers(&self) -> &HeaderStore {
        &self.raw_headers
    }

    pub fn cookies(&self) -> &IndexMap<String, String> {
        &self.cookies
    }

    /// Take the request body. Only the first call succeeds.
    pub fn take_body(&self) -> Result<Bytes, RequestError> {
        lock(&self.body).take().ok_or(RequestError::BodyAlreadyTaken)
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    /// Host the request was addressed to, without port.
    pub fn hostname(&self) -> Option<String> {
        let host = self
            .header("host")
            .map(str::to_string)
            .or_else(|| self.uri.host().map(str::to_string))?;
        Some(strip_port(&host).to_string())
    }

    /// Port the request arrived on, when known.
    pub fn port(&self) -> Option<u16> {
        if let Some(port) = self.uri.port_u16() {
            return Some(port);
        }
        let host = self.header("host")?;
        let (_, port) = host.rsplit_once(':')?;
        if host.ends_with(']') {
            return None;
        }
        port.parse().ok()
    }

    /// Websocket or other protocol upgrade request.
    pub fn is_upgrade(&self) -> bool {
        self.header("upgrade").is_some()
    }

    pub fn meta(&self) -> RequestMeta {
        lock(&self.meta).clone()
    }

    pub fn update_meta(&self, f: impl FnOnce(&mut RequestMeta)) {
        f(&mut lock(&self.meta));
    }

    pub fn mark(&self, name: &str) {
        lock(&self.timing).mark(name);
    }

    pub fn timing(&self) -> TimingContext {
        lock(&self.timing).clone()
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

fn flatten_headers(raw: &HeaderStore) -> IndexMap<String, String> {
    let mut out: IndexMap<String, String> = IndexMap::new();
    for (name, value) in raw.iter() {
        let name = name.to_ascii_lowercase();
        match out.get_mut(&name) {
            None => {
                out.insert(name, value.to_string());
            }
            Some(_) if SINGLETON_HEADERS.contains(&name.as_str()) => {}
            Some(existing) => {
                let sep = if name == "cookie" { "; " } else { ", " };
                existing.push_str(sep);
                existing.push_str(value);
            }
        }
    }
    out
}

/// Parse a `Cookie` header into name/value pairs; the first occurrence of a
/// name wins.
pub fn parse_cookies(header: &str) -> IndexMap<String, String> {
    let mut cookies = IndexMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || cookies.contains_key(name) {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let decoded = percent_decode(value);
        cookies.insert(name.to_string(), decoded);
    }
    cookies
}

fn percent_decode(value: &str) -> String {
    percent_decode_str(value)
        .decode_utf8()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(builder: http::request::Builder) -> RequestAdapter {
        RequestAdapter::from_platform(
            builder.body(Bytes::from_static(b"payload")).unwrap(),
            ClientInfo::new("203.0.113.9"),
        )
    }

    #[test]
    fn test_url_and_query() {
        let req = request(http::Request::get("https://site.test/blog/post?id=7&tag=a&tag=b"));
        assert_eq!(req.url(), "/blog/post?id=7&tag=a&tag=b");
        assert_eq!(req.pathname(), "/blog/post");
        assert_eq!(req.query().get_all("tag").len(), 2);
        assert_eq!(req.meta().init_url, "/blog/post?id=7&tag=a&tag=b");
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let req = request(
            http::Request::get("/")
                .header("Accept", "text/html")
                .header("accept", "application/json")
                .header("Cookie", "a=1")
                .header("cookie", "b=2")
                .header("User-Agent", "first")
                .header("user-agent", "second"),
        );
        assert_eq!(req.header("accept"), Some("text/html, application/json"));
        assert_eq!(req.header("cookie"), Some("a=1; b=2"));
        assert_eq!(req.header("user-agent"), Some("first"));
        assert_eq!(req.header_values("Accept").len(), 2);
    }

    #[test]
    fn test_cookies_parsed() {
        let req = request(
            http::Request::get("/").header("cookie", "theme=dark; id=\"x%20y\"; theme=light"),
        );
        assert_eq!(req.cookies().get("theme").map(String::as_str), Some("dark"));
        assert_eq!(req.cookies().get("id").map(String::as_str), Some("x y"));
    }

    #[test]
    fn test_body_is_one_shot() {
        let req = request(http::Request::post("/api/echo"));
        assert_eq!(&req.take_body().unwrap()[..], b"payload");
        assert_eq!(req.take_body(), Err(RequestError::BodyAlreadyTaken));
    }

    #[test]
    fn test_host_and_port() {
        let req = request(http::Request::get("/").header("host", "example.com:8443"));
        assert_eq!(req.hostname().as_deref(), Some("example.com"));
        assert_eq!(req.port(), Some(8443));

        let req = request(http::Request::get("/").header("host", "example.com"));
        assert_eq!(req.port(), None);
    }

    #[test]
    fn test_set_url_rewrites_pathname() {
        let req = request(http::Request::get("/a?x=1"));
        req.set_url("/b?y=2");
        assert_eq!(req.pathname(), "/b");
        assert_eq!(req.query().get("y"), Some("2"));
        assert_eq!(req.meta().init_url, "/a?x=1");
    }
}
