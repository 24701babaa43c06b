//! Entity tags and conditional-GET freshness.

use base64::Engine;
use sha1::{Digest, Sha1};

/// ETag of the empty payload.
pub const EMPTY_ETAG: &str = "\"0-2jmj7l5rSw0yVb/vlWAYkK/YBwk\"";

/// Compute the ETag of a payload: `"<hex byte length>-<base64 sha1, 27 chars>"`.
pub fn generate_etag(payload: &[u8]) -> String {
    if payload.is_empty() {
        return EMPTY_ETAG.to_string();
    }
    let digest = Sha1::digest(payload);
    let hash = base64::engine::general_purpose::STANDARD.encode(digest);
    format!("\"{:x}-{}\"", payload.len(), &hash[..27])
}

/// Conditional headers sent by the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestConditions<'a> {
    pub if_none_match: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
    pub cache_control: Option<&'a str>,
}

impl<'a> RequestConditions<'a> {
    /// Collect the conditional headers through a case-insensitive lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<&'a str>) -> Self {
        Self {
            if_none_match: lookup("if-none-match"),
            if_modified_since: lookup("if-modified-since"),
            cache_control: lookup("cache-control"),
        }
    }
}

/// Validators the response would carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validators<'a> {
    pub etag: Option<&'a str>,
    pub last_modified: Option<&'a str>,
}

/// Whether the client's cached copy is still fresh, so a 304 can be sent.
pub fn fresh(req: &RequestConditions<'_>, res: &Validators<'_>) -> bool {
    let none_match = req.if_none_match.filter(|v| !v.is_empty());
    let modified_since = req.if_modified_since.filter(|v| !v.is_empty());

    if none_match.is_none() && modified_since.is_none() {
        return false;
    }

    // An end-to-end reload always goes to the origin.
    if let Some(cc) = req.cache_control {
        if cc.split(',').any(|d| d.trim() == "no-cache") {
            return false;
        }
    }

    if let Some(none_match) = none_match {
        if none_match.trim() != "*" {
            let Some(etag) = res.etag else {
                return false;
            };
            let matched = none_match.split(',').map(str::trim).any(|token| {
                token == etag
                    || token.strip_prefix("W/") == Some(etag)
                    || etag.strip_prefix("W/") == Some(token)
            });
            if !matched {
                return false;
            }
        }
    }

    if let Some(modified_since) = modified_since {
        let Some(last_modified) = res.last_modified else {
            return false;
        };
        match (parse_http_date(last_modified), parse_http_date(modified_since)) {
            (Some(lm), Some(ims)) if lm <= ims => {}
            _ => return false,
        }
    }

    true
}

/// Parse an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`) into seconds
/// since the Unix epoch.
pub fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();
    let rest = value.split_once(", ").map(|(_, r)| r).unwrap_or(value);
    let mut parts = rest.split_whitespace();
    let day: i64 = parts.next()?.parse().ok()?;
    let month = match parts.next()? {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    };
    let year: i64 = parts.next()?.parse().ok()?;
    let mut clock = parts.next()?.split(':');
    let hour: i64 = clock.next()?.parse().ok()?;
    let minute: i64 = clock.next()?.parse().ok()?;
    let second: i64 = clock.next()?.parse().ok()?;
    if !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    Some(days_from_civil(year, month, day) * 86_400 + hour * 3600 + minute * 60 + second)
}

// Howard Hinnant's days-from-civil algorithm.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
