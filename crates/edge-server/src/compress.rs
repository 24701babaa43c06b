//! Response compression negotiated through `Accept-Encoding`.

use std::io::Write;

use bytes::Bytes;
use edge_core::ResponseBody;
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, VARY};
use http::HeaderValue;

use crate::ServerResult;

/// Supported content codings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
        }
    }
}

/// Pick the coding for an `Accept-Encoding` header, gzip over deflate on
/// equal weight. Codings with `q=0` are refused.
pub fn accepted_encoding(accept_encoding: Option<&str>) -> Option<Encoding> {
    let header = accept_encoding?;
    let mut best: Option<(Encoding, f32)> = None;

    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let name = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let weight = parts
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if weight <= 0.0 {
            continue;
        }
        let encoding = match name.as_str() {
            "gzip" | "x-gzip" | "*" => Encoding::Gzip,
            "deflate" => Encoding::Deflate,
            _ => continue,
        };
        let better = match best {
            None => true,
            Some((current, w)) => {
                weight > w
                    || (weight == w && encoding == Encoding::Gzip && current != Encoding::Gzip)
            }
        };
        if better {
            best = Some((encoding, weight));
        }
    }

    best.map(|(encoding, _)| encoding)
}

/// Compress a buffer.
pub fn compress(data: &[u8], encoding: Encoding) -> std::io::Result<Bytes> {
    let out = match encoding {
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?
        }
        Encoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?
        }
    };
    Ok(Bytes::from(out))
}

/// Compress a buffered response body in place.
///
/// Responses that already carry a `Content-Encoding`, have no body, or
/// stream their body are returned unchanged.
pub fn compress_response(
    mut response: http::Response<ResponseBody>,
    accept_encoding: Option<&str>,
) -> ServerResult<http::Response<ResponseBody>> {
    if response.headers().contains_key(CONTENT_ENCODING) {
        return Ok(response);
    }
    let Some(encoding) = accepted_encoding(accept_encoding) else {
        return Ok(response);
    };
    let ResponseBody::Full(bytes) = response.body() else {
        return Ok(response);
    };
    if bytes.is_empty() {
        return Ok(response);
    }

    let compressed = compress(bytes, encoding)?;
    let headers = response.headers_mut();
    headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.as_str()));
    headers.append(VARY, HeaderValue::from_static("Accept-Encoding"));
    if headers.contains_key(CONTENT_LENGTH) {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(compressed.len()));
    }
    *response.body_mut() = ResponseBody::Full(compressed);
    Ok(response)
}
