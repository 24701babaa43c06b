//! Sending rendered payloads.

use edge_cache::{fresh, generate_etag, RequestConditions, Validators};
use edge_core::{BodyWriter, HeaderAccess, RequestAdapter, ResponseAdapter, StatusHolder};

use crate::{PayloadType, RenderResult, ServerResult};

/// Server options that shape a payload response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadOptions {
    pub generate_etags: bool,
    pub powered_by_header: bool,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            generate_etags: true,
            powered_by_header: true,
        }
    }
}

/// Set `ETag` and answer `304` when the client copy is fresh.
///
/// Returns `true` when the response has been sent.
pub fn send_etag_response(
    req: &RequestAdapter,
    res: &ResponseAdapter,
    etag: Option<&str>,
) -> ServerResult<bool> {
    if let Some(etag) = etag {
        res.set_header("ETag", etag)?;
    }
    let conditions = RequestConditions::from_lookup(|name| req.header(name));
    let validators = Validators {
        etag,
        last_modified: None,
    };
    if fresh(&conditions, &validators) {
        res.set_status(304)?;
        res.empty_body()?;
        res.send();
        return Ok(true);
    }
    Ok(false)
}

/// Write a render result to the response and send it.
///
/// Complete payloads get an ETag, a `Content-Length` and a 304 when the
/// client copy is fresh. Streamed payloads are piped as they are produced.
pub fn send_render_result(
    req: &RequestAdapter,
    res: &ResponseAdapter,
    result: RenderResult,
    kind: PayloadType,
    options: PayloadOptions,
) -> ServerResult<()> {
    if res.is_sent() {
        return Ok(());
    }

    if options.powered_by_header && kind == PayloadType::Html {
        res.set_header("X-Powered-By", "Next.js")?;
    }

    let payload = result.to_unchunked_string().map(str::to_string);

    if let Some(payload) = &payload {
        let etag = options.generate_etags.then(|| generate_etag(payload.as_bytes()));
        if send_etag_response(req, res, etag.as_deref())? {
            return Ok(());
        }
    }

    if !res.has_header("Content-Type") {
        res.set_header("Content-Type", kind.content_type())?;
    }
    if let Some(payload) = &payload {
        res.set_header("Content-Length", payload.len().to_string())?;
    }
    if let Some(policy) = result.cache {
        if let Some(value) = policy.cache_control(res.get_header("Cache-Control").as_deref())? {
            res.set_header("Cache-Control", value)?;
        }
    }

    if req.method() == http::Method::HEAD {
        res.empty_body()?;
    } else if let Some(payload) = payload {
        res.body(payload)?;
    } else if let Some(stream) = result.into_stream() {
        res.pipe(stream)?;
    }
    res.send();
    Ok(())
}
