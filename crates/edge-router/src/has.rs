//! `has` / `missing` conditions on custom routes.

use edge_assets::RouteHas;
use edge_core::{Query, RequestAdapter};
use regex::Regex;

use crate::{ParamValue, Params};

/// Param name derived from a header, cookie or query key.
fn safe_param_name(key: &str) -> String {
    let name: String = key.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{name}")
    } else {
        name
    }
}

fn lookup(req: &RequestAdapter, item: &RouteHas, query: &Query) -> Option<String> {
    match item {
        RouteHas::Header { key, .. } => req.header(key).map(str::to_string),
        RouteHas::Cookie { key, .. } => req.cookies().get(key).cloned(),
        RouteHas::Query { key, .. } => query.get_all(key).last().cloned(),
        RouteHas::Host { .. } => req.hostname().map(|h| h.to_ascii_lowercase()),
    }
}

/// Check one condition, collecting the params it captures.
fn check(req: &RequestAdapter, item: &RouteHas, query: &Query, params: &mut Params) -> bool {
    let Some(actual) = lookup(req, item, query) else {
        return false;
    };
    let (key, expected) = match item {
        RouteHas::Header { key, value }
        | RouteHas::Cookie { key, value }
        | RouteHas::Query { key, value } => (Some(key.as_str()), value.as_deref()),
        RouteHas::Host { value } => (None, Some(value.as_str())),
    };

    let Some(expected) = expected else {
        if let Some(key) = key {
            params.insert(safe_param_name(key), ParamValue::Single(actual));
        }
        return true;
    };

    let matcher = match Regex::new(&format!("^(?:{expected})$")) {
        Ok(matcher) => matcher,
        Err(e) => {
            tracing::warn!(pattern = %expected, error = %e, "Unsupported route condition pattern");
            return false;
        }
    };
    let Some(captures) = matcher.captures(&actual) else {
        return false;
    };

    let mut named = false;
    for name in matcher.capture_names().flatten() {
        named = true;
        if let Some(value) = captures.name(name) {
            params.insert(name.to_string(), ParamValue::Single(value.as_str().to_string()));
        }
    }
    if !named && matches!(item, RouteHas::Host { .. }) {
        params.insert("host".to_string(), ParamValue::Single(actual));
    }
    true
}

/// Evaluate a route's `has` and `missing` conditions.
///
/// Returns the params captured by `has` when every `has` condition holds
/// and no `missing` condition does; `None` otherwise.
pub fn match_has(
    req: &RequestAdapter,
    has: &[RouteHas],
    missing: &[RouteHas],
    query: &Query,
) -> Option<Params> {
    let mut params = Params::new();
    if !has.iter().all(|item| check(req, item, query, &mut params)) {
        return None;
    }
    let mut scratch = Params::new();
    if missing.iter().any(|item| check(req, item, query, &mut scratch)) {
        return None;
    }
    Some(params)
}
