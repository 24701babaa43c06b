//! Serving files straight from the asset store.

use edge_assets::{AssetError, VirtualFs};
use edge_cache::{fresh, generate_etag, RequestConditions, Validators};
use edge_core::{RequestAdapter, ResponseAdapter, ResponseBody, ResponseError};
use edge_security::decode_uri_component;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use http::{HeaderValue, StatusCode};

use crate::compress::compress_response;
use crate::ServerResult;

/// Options for static responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticOptions {
    pub compress: bool,
    pub generate_etags: bool,
}

fn header_value(value: &str) -> Result<HeaderValue, ResponseError> {
    HeaderValue::from_str(value).map_err(|e| ResponseError::Build(e.to_string()))
}

/// Serve the file at `path` (percent-encoded, relative to the build root)
/// as an override response and send it.
///
/// Headers already staged on `res`, such as an immutable `Cache-Control`,
/// are carried over.
pub fn serve_static(
    vfs: &VirtualFs,
    req: &RequestAdapter,
    res: &ResponseAdapter,
    path: &str,
    options: StaticOptions,
) -> ServerResult<()> {
    let decoded = decode_uri_component(path).ok_or_else(|| AssetError::NotFound(path.to_string()))?;
    let content = vfs.read_file(&decoded)?.to_bytes();
    let content_type = vfs.content_type(&decoded)?;

    let mut headers = res.headers().to_header_map();
    headers.insert(CONTENT_TYPE, header_value(content_type)?);

    let etag = options.generate_etags.then(|| generate_etag(&content));
    if let Some(etag) = &etag {
        headers.insert(ETAG, header_value(etag)?);
    }
    let conditions = RequestConditions::from_lookup(|name| req.header(name));
    let validators = Validators {
        etag: etag.as_deref(),
        last_modified: None,
    };

    let (status, body) = if fresh(&conditions, &validators) {
        (StatusCode::NOT_MODIFIED, ResponseBody::Empty)
    } else {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(content.len()));
        let body = if req.method() == http::Method::HEAD {
            ResponseBody::Empty
        } else {
            ResponseBody::Full(content)
        };
        (StatusCode::OK, body)
    };

    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    if options.compress {
        response = compress_response(response, req.header("accept-encoding"))?;
    }

    tracing::trace!(path = %decoded, status = status.as_u16(), "static file served");
    res.set_override(response);
    res.send();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use edge_assets::AssetStore;
    use edge_core::{ClientInfo, HeaderAccess};

    const OPTIONS: StaticOptions = StaticOptions {
        compress: true,
        generate_etags: true,
    };

    fn vfs() -> VirtualFs {
        let store = AssetStore::builder()
            .text("/public/hello world.txt", "hello", "text/plain")
            .text("/public/big.css", "body{color:red}".repeat(40), "text/css")
            .build();
        VirtualFs::new(store, "/")
    }

    fn request(method: &str, headers: &[(&str, &str)]) -> RequestAdapter {
        let mut builder = http::Request::builder().method(method).uri("/x");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        RequestAdapter::from_platform(builder.body(Bytes::new()).unwrap(), ClientInfo::default())
    }

    async fn serve(
        req: &RequestAdapter,
        path: &str,
        staged: Option<(&str, &str)>,
    ) -> ServerResult<http::Response<ResponseBody>> {
        let (res, pending) = ResponseAdapter::new();
        if let Some((name, value)) = staged {
            res.set_header(name, value).unwrap();
        }
        serve_static(&vfs(), req, &res, path, OPTIONS)?;
        Ok(pending.materialize().await.unwrap().response)
    }

    #[tokio::test]
    async fn test_serves_decoded_path_with_staged_headers() {
        let req = request("GET", &[]);
        let out = serve(&req, "/public/hello%20world.txt", Some(("Cache-Control", "max-age=1")))
            .await
            .unwrap();
        assert_eq!(out.status(), 200);
        assert_eq!(out.headers()["content-type"], "text/plain");
        assert_eq!(out.headers()["cache-control"], "max-age=1");
        assert_eq!(out.headers()["content-length"], "5");
        assert_eq!(out.headers()["etag"], generate_etag(b"hello").as_str());
        assert_eq!(&out.into_body().collect().await.unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let req = request("GET", &[]);
        let err = serve(&req, "/public/nope.txt", None).await.unwrap_err();
        assert!(err.is_not_found());
        let err = serve(&req, "/public/%zz", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fresh_etag_gives_304() {
        let etag = generate_etag(b"hello");
        let req = request("GET", &[("if-none-match", etag.as_str())]);
        let out = serve(&req, "/public/hello%20world.txt", None).await.unwrap();
        assert_eq!(out.status(), 304);
        assert!(out.body().is_empty());
    }

    #[tokio::test]
    async fn test_head_has_headers_only() {
        let req = request("HEAD", &[]);
        let out = serve(&req, "/public/hello%20world.txt", None).await.unwrap();
        assert_eq!(out.headers()["content-length"], "5");
        assert!(out.body().is_empty());
    }

    #[tokio::test]
    async fn test_compressed_when_accepted() {
        let req = request("GET", &[("accept-encoding", "deflate")]);
        let out = serve(&req, "/public/big.css", None).await.unwrap();
        assert_eq!(out.headers()["content-encoding"], "deflate");

        let req = request("GET", &[]);
        let out = serve(&req, "/public/big.css", None).await.unwrap();
        assert!(out.headers().get("content-encoding").is_none());
    }
}
