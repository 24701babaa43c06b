//! Dynamic page routes: `/post/[id]`, `/docs/[...slug]`, `/shop/[[...path]]`.

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::{ParamValue, Params, RouteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SegmentKind {
    Static,
    Dynamic,
    CatchAll,
    OptionalCatchAll,
}

fn classify(segment: &str) -> (SegmentKind, &str) {
    if let Some(name) = segment
        .strip_prefix("[[...")
        .and_then(|s| s.strip_suffix("]]"))
    {
        return (SegmentKind::OptionalCatchAll, name);
    }
    if let Some(name) = segment.strip_prefix("[...").and_then(|s| s.strip_suffix(']')) {
        return (SegmentKind::CatchAll, name);
    }
    if let Some(name) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return (SegmentKind::Dynamic, name);
    }
    (SegmentKind::Static, segment)
}

fn segments(page: &str) -> impl Iterator<Item = &str> {
    page.split('/').filter(|s| !s.is_empty())
}

/// Whether a page path has at least one `[param]` segment.
pub fn is_dynamic_route(page: &str) -> bool {
    segments(page).any(|s| classify(s).0 != SegmentKind::Static)
}

#[derive(Debug, Clone)]
struct Group {
    name: String,
    capture: String,
    repeat: bool,
}

/// A compiled dynamic page route.
#[derive(Debug, Clone)]
pub struct DynamicRoute {
    page: String,
    regex: Regex,
    groups: Vec<Group>,
}

impl DynamicRoute {
    pub fn new(page: &str) -> Result<Self, RouteError> {
        let mut body = String::new();
        let mut groups = Vec::new();
        for segment in segments(page) {
            let (kind, name) = classify(segment);
            let capture = format!("g{}", groups.len());
            match kind {
                SegmentKind::Static => {
                    body.push('/');
                    body.push_str(&regex::escape(segment));
                    continue;
                }
                SegmentKind::Dynamic => body.push_str(&format!("/(?P<{capture}>[^/]+?)")),
                SegmentKind::CatchAll => body.push_str(&format!("/(?P<{capture}>.+?)")),
                SegmentKind::OptionalCatchAll => {
                    body.push_str(&format!("(?:/(?P<{capture}>.+?))?"))
                }
            }
            groups.push(Group {
                name: name.to_string(),
                capture,
                repeat: matches!(kind, SegmentKind::CatchAll | SegmentKind::OptionalCatchAll),
            });
        }

        let regex = Regex::new(&format!("^{body}(?:/)?$")).map_err(|e| RouteError::InvalidPattern {
            pattern: page.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            page: page.to_string(),
            regex,
            groups,
        })
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    /// Match a pathname, decoding each captured segment. Undecodable
    /// segments never match.
    pub fn matches(&self, pathname: &str) -> Option<Params> {
        let captures = self.regex.captures(pathname)?;
        let mut params = Params::new();
        for group in &self.groups {
            let Some(raw) = captures.name(&group.capture) else {
                continue;
            };
            let value = if group.repeat {
                let parts = raw
                    .as_str()
                    .split('/')
                    .map(decode)
                    .collect::<Option<Vec<_>>>()?;
                ParamValue::Multi(parts)
            } else {
                ParamValue::Single(decode(raw.as_str())?)
            };
            params.insert(group.name.clone(), value);
        }
        Some(params)
    }
}

fn decode(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Order dynamic pages so more specific routes are tried first: at each
/// level static segments (alphabetically) before `[param]`, before
/// `[...param]`, before `[[...param]]`, and a parent before its children.
pub fn sort_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut pages: Vec<&str> = pages.into_iter().collect();
    pages.sort_by_cached_key(|page| {
        segments(page)
            .map(|s| match classify(s) {
                (SegmentKind::Static, name) => (SegmentKind::Static, name.to_string()),
                (kind, _) => (kind, String::new()),
            })
            .collect::<Vec<_>>()
    });
    pages
}

/// Compile the dynamic routes among `pages`, most specific first.
pub fn dynamic_routes<'a>(
    pages: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<DynamicRoute>, RouteError> {
    sort_pages(pages.into_iter().filter(|p| is_dynamic_route(p)))
        .into_iter()
        .map(DynamicRoute::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_dynamic_route() {
        assert!(is_dynamic_route("/post/[id]"));
        assert!(is_dynamic_route("/[...slug]"));
        assert!(!is_dynamic_route("/about"));
        assert!(!is_dynamic_route("/"));
    }

    #[test]
    fn test_single_param() {
        let route = DynamicRoute::new("/routing/dynamic/simple/[id]").unwrap();
        let params = route.matches("/routing/dynamic/simple/42").unwrap();
        assert_eq!(params["id"], ParamValue::Single("42".into()));
        assert!(route.matches("/routing/dynamic/simple").is_none());
        assert!(route.matches("/routing/dynamic/simple/4/2").is_none());
    }

    #[test]
    fn test_intermediate_param() {
        let route = DynamicRoute::new("/routing/dynamic/[intermediate]/post").unwrap();
        let params = route.matches("/routing/dynamic/abc/post").unwrap();
        assert_eq!(params["intermediate"], ParamValue::Single("abc".into()));
    }

    #[test]
    fn test_catch_all() {
        let route = DynamicRoute::new("/routing/dynamic/catchall/[...args]").unwrap();
        let params = route.matches("/routing/dynamic/catchall/a/b%20c").unwrap();
        assert_eq!(
            params["args"],
            ParamValue::Multi(vec!["a".into(), "b c".into()])
        );
        assert!(route.matches("/routing/dynamic/catchall").is_none());
    }

    #[test]
    fn test_optional_catch_all() {
        let route = DynamicRoute::new("/shop/[[...path]]").unwrap();
        assert!(route.matches("/shop").unwrap().is_empty());
        assert_eq!(
            route.matches("/shop/a").unwrap()["path"],
            ParamValue::Multi(vec!["a".into()])
        );
    }

    #[test]
    fn test_undecodable_segment() {
        let route = DynamicRoute::new("/post/[id]").unwrap();
        assert!(route.matches("/post/%ff").is_none());
    }

    #[test]
    fn test_sorting() {
        let sorted = sort_pages([
            "/[...all]",
            "/blog/[slug]",
            "/blog/[[...rest]]",
            "/[id]",
            "/blog/featured",
            "/",
        ]);
        assert_eq!(
            sorted,
            vec![
                "/",
                "/blog/featured",
                "/blog/[slug]",
                "/blog/[[...rest]]",
                "/[id]",
                "/[...all]",
            ]
        );
    }

    #[test]
    fn test_dynamic_routes_filters_static_pages() {
        let routes = dynamic_routes(["/about", "/post/[id]", "/api/[name]"]).unwrap();
        let pages: Vec<&str> = routes.iter().map(DynamicRoute::page).collect();
        assert_eq!(pages, vec!["/api/[name]", "/post/[id]"]);
    }
}
