//! Building the target of a rewrite or redirect from its destination
//! template, the matched params and the request query.

use edge_core::{Query, NEXT_DATA_REQ, NEXT_DEFAULT_LOCALE, NEXT_LOCALE};

use crate::matcher::{tokenize, Token};
use crate::{compile_non_path, compile_path, Params, RouteError};

/// Resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDestination {
    /// `scheme://host` when the destination is external.
    pub origin: Option<String>,
    /// Destination pathname with params filled in.
    pub pathname: String,
    /// Request query merged with the destination's own query.
    pub query: Query,
}

impl PreparedDestination {
    pub fn is_external(&self) -> bool {
        self.origin.is_some()
    }

    /// Pathname plus query string, prefixed with the origin when external.
    pub fn to_url(&self) -> String {
        let mut url = self.origin.clone().unwrap_or_default();
        url.push_str(&self.pathname);
        let search = self.query.to_query_string();
        if !search.is_empty() {
            url.push('?');
            url.push_str(&search);
        }
        url
    }
}

/// Split `scheme://host` off an absolute destination.
fn split_origin(destination: &str) -> (Option<&str>, &str) {
    let Some(scheme_end) = destination.find("://") else {
        return (None, destination);
    };
    let after = scheme_end + 3;
    let host_end = destination[after..]
        .find(['/', '?', '#'])
        .map(|i| after + i)
        .unwrap_or(destination.len());
    (Some(&destination[..host_end]), &destination[host_end..])
}

fn template_params(template: &str) -> Vec<String> {
    tokenize(template)
        .map(|tokens| {
            tokens
                .into_iter()
                .filter_map(|t| match t {
                    Token::Param { name, named: true, .. } => Some(name),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Fill a destination template.
///
/// Query precedence, lowest to highest: the request query (without the
/// internal locale and data-request keys), params appended when
/// `append_params_to_query` is set and the destination does not use any of
/// them, then the destination's own query values.
pub fn prepare_destination(
    destination: &str,
    params: &Params,
    query: &Query,
    append_params_to_query: bool,
) -> Result<PreparedDestination, RouteError> {
    let (origin, rest) = split_origin(destination);
    let rest = rest.split('#').next().unwrap_or_default();
    let (path_template, dest_search) = rest.split_once('?').unwrap_or((rest, ""));
    let path_template = if path_template.is_empty() { "/" } else { path_template };

    let mut dest_query = Query::new();
    for (key, value) in Query::parse(dest_search).iter() {
        for v in value {
            dest_query.append(key, compile_non_path(v, params));
        }
    }

    let mut used = template_params(path_template);
    if let Some(origin) = origin {
        used.extend(template_params(origin));
    }
    if append_params_to_query && !params.keys().any(|k| used.contains(k)) {
        for (key, value) in params {
            if dest_query.contains(key) {
                continue;
            }
            for v in value.values() {
                dest_query.append(key.as_str(), v);
            }
        }
    }

    let pathname = compile_path(path_template, params)?;
    let origin = origin.map(|o| compile_non_path(o, params));

    let mut merged = query.clone();
    for key in [NEXT_LOCALE, NEXT_DEFAULT_LOCALE, NEXT_DATA_REQ] {
        merged.remove(key);
    }
    merged.extend(dest_query);

    Ok(PreparedDestination {
        origin,
        pathname,
        query: merged,
    })
}

/// Collapse runs of `/` and `\` in the path part of a url.
pub fn normalize_repeated_slashes(url: &str) -> String {
    let (path, search) = match url.find('?') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let mut out = String::with_capacity(url.len());
    let mut last_slash = false;
    for c in path.chars() {
        let is_slash = c == '/' || c == '\\';
        if is_slash {
            if !last_slash {
                out.push('/');
            }
        } else {
            out.push(c);
        }
        last_slash = is_slash;
    }
    out.push_str(search);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamValue;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ParamValue::Single(v.to_string())))
            .collect()
    }

    #[test]
    fn test_internal_destination_appends_unused_params() {
        let prepared = prepare_destination(
            "/post",
            &params(&[("slug", "hello")]),
            &Query::parse("a=1"),
            true,
        )
        .unwrap();
        assert!(!prepared.is_external());
        assert_eq!(prepared.pathname, "/post");
        assert_eq!(prepared.query.get("a"), Some("1"));
        assert_eq!(prepared.query.get("slug"), Some("hello"));
    }

    #[test]
    fn test_used_params_not_appended() {
        let prepared = prepare_destination(
            "/news/:slug",
            &params(&[("slug", "hello")]),
            &Query::new(),
            true,
        )
        .unwrap();
        assert_eq!(prepared.pathname, "/news/hello");
        assert!(!prepared.query.contains("slug"));
    }

    #[test]
    fn test_destination_query_wins() {
        let prepared = prepare_destination(
            "/search?q=:term&src=rewrite",
            &params(&[("term", "shoes")]),
            &Query::parse("src=user&page=2"),
            false,
        )
        .unwrap();
        assert_eq!(prepared.query.get("q"), Some("shoes"));
        assert_eq!(prepared.query.get("src"), Some("rewrite"));
        assert_eq!(prepared.query.get("page"), Some("2"));
    }

    #[test]
    fn test_internal_keys_dropped() {
        let prepared = prepare_destination(
            "/x",
            &Params::new(),
            &Query::parse("__nextLocale=fr&__nextDataReq=1&keep=1"),
            true,
        )
        .unwrap();
        assert!(!prepared.query.contains(NEXT_LOCALE));
        assert!(!prepared.query.contains(NEXT_DATA_REQ));
        assert_eq!(prepared.query.get("keep"), Some("1"));
    }

    #[test]
    fn test_external_destination() {
        let mut p = Params::new();
        p.insert(
            "path".into(),
            ParamValue::Multi(vec!["a".into(), "b".into()]),
        );
        let prepared =
            prepare_destination(
                "https://httpbin.org/anything/:path*",
                &p,
                &Query::parse("x=1"),
                true,
            )
                .unwrap();
        assert!(prepared.is_external());
        assert_eq!(prepared.to_url(), "https://httpbin.org/anything/a/b?x=1");
    }

    #[test]
    fn test_normalize_repeated_slashes() {
        assert_eq!(normalize_repeated_slashes("//a///b?x=//y"), "/a/b?x=//y");
        assert_eq!(normalize_repeated_slashes("/a\\b"), "/a/b");
    }
}
