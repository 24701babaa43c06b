//! The ordered route table.
//!
//! Routes run in a fixed order: custom headers, redirects, `beforeFiles`
//! rewrites, filesystem routes, `afterFiles` rewrites, the page check,
//! `fallback` rewrites and finally the catch-all. The first route that
//! finishes the response ends routing; routes that return "not finished"
//! may rewrite the url seen by every later route.

use edge_core::{Query, RequestAdapter, ResponseAdapter, NEXT_BUBBLE_NO_FALLBACK};

use crate::i18n::{normalize_locale_path, remove_trailing_slash};
use crate::{match_has, DynamicRoute, ParsedUrl, Route, RouterContext};

/// Prefix of query keys the router carries across rewrites.
const INTERNAL_QUERY_PREFIX: &str = "__next";

enum Step<'a, C: RouterContext> {
    Route(&'a Route<C>),
    PageCheck,
}

enum Outcome {
    Finished,
    Continue,
    /// Rewritten by a route with `check` set.
    Check,
}

pub struct Router<C: RouterContext> {
    headers: Vec<Route<C>>,
    redirects: Vec<Route<C>>,
    before_files: Vec<Route<C>>,
    fs_routes: Vec<Route<C>>,
    after_files: Vec<Route<C>>,
    fallback: Vec<Route<C>>,
    catch_all: Route<C>,
    dynamic_routes: Vec<DynamicRoute>,
    use_file_system_public_routes: bool,
    base_path: String,
    locales: Vec<String>,
}

impl<C: RouterContext> Router<C> {
    pub fn new(catch_all: Route<C>) -> Self {
        Self {
            headers: Vec::new(),
            redirects: Vec::new(),
            before_files: Vec::new(),
            fs_routes: Vec::new(),
            after_files: Vec::new(),
            fallback: Vec::new(),
            catch_all,
            dynamic_routes: Vec::new(),
            use_file_system_public_routes: true,
            base_path: String::new(),
            locales: Vec::new(),
        }
    }

    pub fn with_headers(mut self, routes: Vec<Route<C>>) -> Self {
        self.headers = routes;
        self
    }

    pub fn with_redirects(mut self, routes: Vec<Route<C>>) -> Self {
        self.redirects = routes;
        self
    }

    pub fn with_before_files(mut self, routes: Vec<Route<C>>) -> Self {
        self.before_files = routes;
        self
    }

    pub fn with_fs_routes(mut self, routes: Vec<Route<C>>) -> Self {
        self.fs_routes = routes;
        self
    }

    pub fn with_after_files(mut self, routes: Vec<Route<C>>) -> Self {
        self.after_files = routes;
        self
    }

    pub fn with_fallback(mut self, routes: Vec<Route<C>>) -> Self {
        self.fallback = routes;
        self
    }

    pub fn with_dynamic_routes(mut self, routes: Vec<DynamicRoute>) -> Self {
        self.dynamic_routes = routes;
        self
    }

    /// When disabled, requests for pages only reach the catch-all through
    /// a rewrite.
    pub fn with_page_check(mut self, enabled: bool) -> Self {
        self.use_file_system_public_routes = enabled;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_locales(mut self, locales: Vec<String>) -> Self {
        self.locales = locales;
        self
    }

    pub fn dynamic_routes(&self) -> &[DynamicRoute] {
        &self.dynamic_routes
    }

    /// Number of routes in the table, catch-all included.
    pub fn len(&self) -> usize {
        self.headers.len()
            + self.redirects.len()
            + self.before_files.len()
            + self.fs_routes.len()
            + self.after_files.len()
            + self.fallback.len()
            + 1
    }

    /// Always `false`: the catch-all is part of every table.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Route one request. Returns whether some route finished it; `false`
    /// means nothing answered and the caller renders a 404.
    pub async fn execute(
        &self,
        cx: &C,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        url: &mut ParsedUrl,
    ) -> Result<bool, C::Error> {
        let mut rewritten = false;

        let steps = self
            .headers
            .iter()
            .chain(&self.redirects)
            .chain(&self.before_files)
            .chain(&self.fs_routes)
            .chain(&self.after_files)
            .map(Step::Route)
            .chain(self.use_file_system_public_routes.then_some(Step::PageCheck))
            .chain(self.fallback.iter().map(Step::Route))
            .chain(std::iter::once(Step::Route(&self.catch_all)));

        for step in steps {
            match step {
                Step::PageCheck => {
                    let (pathname, had_base_path) = self.strip_base_path(&url.pathname);
                    if !had_base_path && !rewritten {
                        continue;
                    }
                    let pathname = remove_trailing_slash(&pathname).to_string();
                    if self.page_exists(cx, &pathname).await?
                        && self.run_catch_all(cx, req, res, url, rewritten).await?
                    {
                        return Ok(true);
                    }
                }
                Step::Route(route) => {
                    match self.apply(cx, route, req, res, url, &mut rewritten).await? {
                        Outcome::Finished => return Ok(true),
                        Outcome::Continue => {}
                        Outcome::Check => {
                            if self.check_rewrite(cx, req, res, url).await? {
                                return Ok(true);
                            }
                        }
                    }
                }
            }
        }
        Ok(false)
    }

    /// After a checked rewrite: the filesystem routes, then the page check,
    /// against the new pathname.
    async fn check_rewrite(
        &self,
        cx: &C,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        url: &mut ParsedUrl,
    ) -> Result<bool, C::Error> {
        let mut rewritten = true;
        for route in &self.fs_routes {
            if let Outcome::Finished = self.apply(cx, route, req, res, url, &mut rewritten).await? {
                return Ok(true);
            }
        }

        let pathname = self.strip_base_path(&url.pathname).0;
        let pathname = remove_trailing_slash(&pathname).to_string();
        if self.page_exists(cx, &pathname).await? {
            url.query.insert(NEXT_BUBBLE_NO_FALLBACK, "1");
            // Not finished: the page has no fallback for this path and
            // routing moves on to the `fallback` rewrites.
            if self.run_catch_all(cx, req, res, url, true).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn run_catch_all(
        &self,
        cx: &C,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        url: &mut ParsedUrl,
        mut rewritten: bool,
    ) -> Result<bool, C::Error> {
        let outcome = self
            .apply(cx, &self.catch_all, req, res, url, &mut rewritten)
            .await?;
        Ok(matches!(outcome, Outcome::Finished))
    }

    async fn page_exists(&self, cx: &C, pathname: &str) -> Result<bool, C::Error> {
        if cx.has_page(pathname).await? {
            return Ok(true);
        }
        let normalized = normalize_locale_path(pathname, &self.locales).pathname;
        if normalized != pathname && cx.has_page(&normalized).await? {
            return Ok(true);
        }
        Ok(self
            .dynamic_routes
            .iter()
            .any(|route| route.matches(&normalized).is_some()))
    }

    async fn apply(
        &self,
        cx: &C,
        route: &Route<C>,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        url: &mut ParsedUrl,
        rewritten: &mut bool,
    ) -> Result<Outcome, C::Error> {
        let Some(match_path) = self.match_path(route, &url.pathname, *rewritten) else {
            return Ok(Outcome::Continue);
        };
        let Some(mut params) = route.matcher.matches(&match_path) else {
            return Ok(Outcome::Continue);
        };
        if !route.has.is_empty() || !route.missing.is_empty() {
            let Some(has_params) = match_has(req, &route.has, &route.missing, &url.query) else {
                return Ok(Outcome::Continue);
            };
            params.extend(has_params);
        }

        tracing::debug!(route = %route.name, pathname = %url.pathname, "route matched");

        let original = url.pathname.clone();
        if !route.kind.is_custom() {
            url.pathname = match_path;
        }
        let result = route.handler.handle(cx, req, res, &params, url).await?;
        if result.finished {
            return Ok(Outcome::Finished);
        }
        url.pathname = original;

        let updated = result.pathname.is_some() || result.query.is_some();
        if let Some(pathname) = result.pathname {
            url.pathname = pathname;
            *rewritten = true;
        }
        if let Some(query) = result.query {
            let mut merged: Query = url
                .query
                .iter()
                .filter(|(key, _)| key.starts_with(INTERNAL_QUERY_PREFIX))
                .flat_map(|(key, values)| {
                    values.iter().map(move |v| (key.to_string(), v.clone()))
                })
                .collect();
            merged.extend(query);
            url.query = merged;
        }
        if updated {
            req.set_url(url.to_url());
        }

        Ok(if route.check {
            Outcome::Check
        } else {
            Outcome::Continue
        })
    }

    /// Pathname a route is matched against, or `None` when the route does
    /// not apply to a path outside the base path.
    fn match_path(&self, route: &Route<C>, pathname: &str, rewritten: bool) -> Option<String> {
        let (stripped, had_base_path) = self.strip_base_path(pathname);
        if !route.matches_base_path && !had_base_path && !rewritten {
            return None;
        }
        let path = if route.matches_base_path {
            pathname.to_string()
        } else {
            stripped
        };
        if route.matches_locale {
            return Some(normalize_locale_path(&path, &self.locales).pathname);
        }
        Some(path)
    }

    fn strip_base_path(&self, pathname: &str) -> (String, bool) {
        if self.base_path.is_empty() {
            return (pathname.to_string(), true);
        }
        match pathname.strip_prefix(self.base_path.as_str()) {
            Some("") => ("/".to_string(), true),
            Some(rest) if rest.starts_with('/') => (rest.to_string(), true),
            _ => (pathname.to_string(), false),
        }
    }
}

impl<C: RouterContext> std::fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("headers", &self.headers)
            .field("redirects", &self.redirects)
            .field("before_files", &self.before_files)
            .field("fs_routes", &self.fs_routes)
            .field("after_files", &self.after_files)
            .field("fallback", &self.fallback)
            .field("catch_all", &self.catch_all)
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use edge_assets::{HeaderEntry, HeaderRule, RedirectRule, RewriteRule, RouteHas};
    use edge_core::{BodyWriter, ClientInfo, ResponseError, StatusHolder};

    use super::*;
    use crate::{
        HeaderRoute, Params, RedirectRoute, RewriteRoute, RouteError, RouteHandler, RouteKind,
        RouteResult,
    };

    // === Fixtures ===

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error(transparent)]
        Response(#[from] ResponseError),
        #[error(transparent)]
        Route(#[from] RouteError),
    }

    #[derive(Default)]
    struct TestContext {
        pages: Vec<&'static str>,
        proxied: RefCell<Vec<String>>,
    }

    #[async_trait(?Send)]
    impl RouterContext for TestContext {
        type Error = TestError;

        async fn has_page(&self, pathname: &str) -> Result<bool, TestError> {
            Ok(self.pages.contains(&pathname))
        }

        async fn proxy(
            &self,
            _req: &RequestAdapter,
            res: &ResponseAdapter,
            target_url: &str,
        ) -> Result<(), TestError> {
            self.proxied.borrow_mut().push(target_url.to_string());
            res.body("proxied")?;
            res.send();
            Ok(())
        }
    }

    /// Finishes with a body naming the route and the pathname it saw.
    struct Answer(&'static str);

    #[async_trait(?Send)]
    impl RouteHandler<TestContext> for Answer {
        async fn handle(
            &self,
            _cx: &TestContext,
            _req: &RequestAdapter,
            res: &ResponseAdapter,
            _params: &Params,
            url: &ParsedUrl,
        ) -> Result<RouteResult, TestError> {
            let bubble = url.query.contains(NEXT_BUBBLE_NO_FALLBACK);
            res.body(format!("{}:{}:{}", self.0, url.pathname, bubble))?;
            res.send();
            Ok(RouteResult::finished())
        }
    }

    fn answer(name: &'static str, pattern: &str) -> Route<TestContext> {
        Route::new(name, RouteKind::Route, pattern, Arc::new(Answer(name))).unwrap()
    }

    fn catch_all() -> Route<TestContext> {
        answer("catchall", "/:path*")
    }

    fn request(uri: &str) -> RequestAdapter {
        RequestAdapter::from_platform(
            http::Request::get(uri).body(Bytes::new()).unwrap(),
            ClientInfo::default(),
        )
    }

    fn rewrite(source: &str, destination: &str) -> RewriteRule {
        RewriteRule {
            source: source.into(),
            destination: destination.into(),
            has: vec![],
            missing: vec![],
            base_path: None,
            locale: None,
        }
    }

    fn redirect(source: &str, destination: &str, permanent: bool) -> RedirectRule {
        RedirectRule {
            source: source.into(),
            destination: destination.into(),
            status_code: None,
            permanent: Some(permanent),
            has: vec![],
            missing: vec![],
            base_path: None,
            locale: None,
            internal: false,
        }
    }

    async fn run(
        router: &Router<TestContext>,
        cx: &TestContext,
        uri: &str,
    ) -> (bool, http::Response<Bytes>) {
        let req = request(uri);
        let (res, pending) = ResponseAdapter::new();
        let mut url = ParsedUrl::parse(&req.url());
        let finished = router.execute(cx, &req, &res, &mut url).await.unwrap();
        res.send();
        let materialized = pending.materialize().await.unwrap();
        let (parts, body) = materialized.response.into_parts();
        let body = body.collect().await.unwrap();
        (finished, http::Response::from_parts(parts, body))
    }

    fn text(res: &http::Response<Bytes>) -> &str {
        std::str::from_utf8(res.body()).unwrap()
    }

    // === Ordering ===

    #[tokio::test]
    async fn test_catch_all_runs_last() {
        let router = Router::new(catch_all());
        let (finished, res) = run(&router, &TestContext::default(), "/anything").await;
        assert!(finished);
        assert_eq!(text(&res), "catchall:/anything:false");
    }

    #[tokio::test]
    async fn test_fs_route_before_catch_all() {
        let router = Router::new(catch_all())
            .with_fs_routes(vec![answer("static", "/_next/static/:path*")]);
        let (_, res) = run(&router, &TestContext::default(), "/_next/static/a.js").await;
        assert_eq!(text(&res), "static:/_next/static/a.js:false");
    }

    #[tokio::test]
    async fn test_header_route_continues() {
        let rule = HeaderRule {
            source: "/:path*".into(),
            headers: vec![HeaderEntry {
                key: "x-path".into(),
                value: "seen-:path*".into(),
            }],
            has: vec![],
            missing: vec![],
            base_path: None,
            locale: None,
        };
        let router =
            Router::new(catch_all()).with_headers(vec![HeaderRoute::route(&rule).unwrap()]);
        let (finished, res) = run(&router, &TestContext::default(), "/blog").await;
        assert!(finished);
        assert_eq!(res.headers()["x-path"], "seen-blog");
        assert_eq!(text(&res), "catchall:/blog:false");
    }

    // === Redirects ===

    #[tokio::test]
    async fn test_permanent_redirect() {
        let router = Router::new(catch_all())
            .with_redirects(vec![RedirectRoute::route(
                &redirect("/old/:slug", "/new/:slug", true),
                &[],
            )
            .unwrap()]);
        let (_, res) = run(&router, &TestContext::default(), "/old/post?x=1").await;
        assert_eq!(res.status(), 308);
        assert_eq!(res.headers()["location"], "/new/post?x=1");
        assert_eq!(res.headers()["refresh"], "0;url=/new/post?x=1");
    }

    #[tokio::test]
    async fn test_temporary_redirect_has_no_refresh() {
        let router = Router::new(catch_all())
            .with_redirects(vec![RedirectRoute::route(&redirect("/a", "/b", false), &[]).unwrap()]);
        let (_, res) = run(&router, &TestContext::default(), "/a").await;
        assert_eq!(res.status(), 307);
        assert!(res.headers().get("refresh").is_none());
    }

    #[tokio::test]
    async fn test_redirect_restricted_under_next() {
        let route = RedirectRoute::route(
            &redirect("/:path*", "/elsewhere", false),
            &["/_next".to_string()],
        )
        .unwrap();
        let router = Router::new(catch_all()).with_redirects(vec![route]);
        let (_, res) = run(&router, &TestContext::default(), "/_next/data/x.json").await;
        assert_eq!(res.status(), 200);
        assert_eq!(text(&res), "catchall:/_next/data/x.json:false");
    }

    #[tokio::test]
    async fn test_redirect_has_condition() {
        let mut rule = redirect("/", "/login", false);
        rule.missing = vec![RouteHas::Cookie {
            key: "session".into(),
            value: None,
        }];
        let router = Router::new(catch_all())
            .with_redirects(vec![RedirectRoute::route(&rule, &[]).unwrap()]);

        let (_, res) = run(&router, &TestContext::default(), "/").await;
        assert_eq!(res.status(), 307);

        let req = RequestAdapter::from_platform(
            http::Request::get("/")
                .header("cookie", "session=1")
                .body(Bytes::new())
                .unwrap(),
            ClientInfo::default(),
        );
        let (res, pending) = ResponseAdapter::new();
        let mut url = ParsedUrl::parse(&req.url());
        router.execute(&TestContext::default(), &req, &res, &mut url).await.unwrap();
        assert_eq!(pending.materialize().await.unwrap().response.status(), 200);
    }

    // === Rewrites ===

    #[tokio::test]
    async fn test_before_files_rewrite_changes_pathname() {
        let router = Router::new(catch_all())
            .with_before_files(vec![RewriteRoute::route(
                &rewrite("/docs/:slug", "/guides/:slug"),
                false,
            )
            .unwrap()]);
        let (_, res) = run(&router, &TestContext::default(), "/docs/intro").await;
        assert_eq!(text(&res), "catchall:/guides/intro:false");
    }

    #[tokio::test]
    async fn test_rewrite_appends_params_and_updates_request() {
        let router = Router::new(catch_all())
            .with_before_files(vec![
                RewriteRoute::route(&rewrite("/p/:id", "/post"), false).unwrap()
            ]);
        let req = request("/p/7?__nextLocale=en&x=1");
        let (res, _pending) = ResponseAdapter::new();
        let mut url = ParsedUrl::parse(&req.url());
        router.execute(&TestContext::default(), &req, &res, &mut url).await.unwrap();
        assert_eq!(url.pathname, "/post");
        assert_eq!(url.query.get("id"), Some("7"));
        assert_eq!(url.query.get("x"), Some("1"));
        assert_eq!(url.query.get("__nextLocale"), Some("en"));
        assert_eq!(req.pathname(), "/post");
    }

    #[tokio::test]
    async fn test_checked_rewrite_reaches_fs_route() {
        let router = Router::new(catch_all())
            .with_fs_routes(vec![answer("public", "/robots.txt")])
            .with_after_files(vec![
                RewriteRoute::route(&rewrite("/bots", "/robots.txt"), true).unwrap()
            ]);
        let (_, res) = run(&router, &TestContext::default(), "/bots").await;
        assert_eq!(text(&res), "public:/robots.txt:false");
    }

    #[tokio::test]
    async fn test_checked_rewrite_to_page_bubbles() {
        let cx = TestContext {
            pages: vec!["/about"],
            ..Default::default()
        };
        let router = Router::new(catch_all())
            .with_after_files(vec![RewriteRoute::route(&rewrite("/team", "/about"), true).unwrap()])
            .with_fallback(vec![answer("fallback", "/:path*")]);
        let (_, res) = run(&router, &cx, "/team").await;
        assert_eq!(text(&res), "catchall:/about:true");
    }

    /// Catch-all for pages without a fallback: passes when asked to bubble.
    struct NoFallback;

    #[async_trait(?Send)]
    impl RouteHandler<TestContext> for NoFallback {
        async fn handle(
            &self,
            cx: &TestContext,
            req: &RequestAdapter,
            res: &ResponseAdapter,
            params: &Params,
            url: &ParsedUrl,
        ) -> Result<RouteResult, TestError> {
            if url.query.contains(NEXT_BUBBLE_NO_FALLBACK) {
                return Ok(RouteResult::next());
            }
            Answer("catchall").handle(cx, req, res, params, url).await
        }
    }

    #[tokio::test]
    async fn test_bubbled_page_reaches_fallback_rewrites() {
        let cx = TestContext {
            pages: vec!["/about"],
            ..Default::default()
        };
        let catch_all = Route::new("catchall", RouteKind::Route, "/:path*", Arc::new(NoFallback))
            .unwrap();
        let router = Router::new(catch_all)
            .with_after_files(vec![RewriteRoute::route(&rewrite("/team", "/about"), true).unwrap()])
            .with_fallback(vec![answer("fallback", "/:path*")]);
        let (finished, res) = run(&router, &cx, "/team").await;
        assert!(finished);
        assert_eq!(text(&res), "fallback:/about:true");
    }

    #[tokio::test]
    async fn test_external_rewrite_is_proxied() {
        let cx = TestContext::default();
        let router = Router::new(catch_all()).with_before_files(vec![RewriteRoute::route(
            &rewrite("/api/:path*", "https://backend.test/:path*"),
            false,
        )
        .unwrap()]);
        let (finished, res) = run(&router, &cx, "/api/users").await;
        assert!(finished);
        assert_eq!(text(&res), "proxied");
        assert_eq!(cx.proxied.borrow().as_slice(), ["https://backend.test/users"]);
    }

    // === Page check ===

    #[tokio::test]
    async fn test_page_check_before_fallback() {
        let cx = TestContext {
            pages: vec!["/about"],
            ..Default::default()
        };
        let router = Router::new(catch_all()).with_fallback(vec![answer("fallback", "/:path*")]);
        let (_, res) = run(&router, &cx, "/about/").await;
        assert_eq!(text(&res), "catchall:/about/:false");
        let (_, res) = run(&router, &cx, "/missing").await;
        assert_eq!(text(&res), "fallback:/missing:false");
    }

    #[tokio::test]
    async fn test_page_check_matches_dynamic_routes() {
        let router = Router::new(catch_all())
            .with_dynamic_routes(vec![DynamicRoute::new("/post/[id]").unwrap()])
            .with_locales(vec!["en".into(), "fr".into()])
            .with_fallback(vec![answer("fallback", "/:path*")]);
        let (_, res) = run(&router, &TestContext::default(), "/fr/post/1").await;
        assert_eq!(text(&res), "catchall:/fr/post/1:false");
    }

    #[tokio::test]
    async fn test_page_check_strips_locale() {
        let cx = TestContext {
            pages: vec!["/about"],
            ..Default::default()
        };
        let router = Router::new(catch_all())
            .with_locales(vec!["en".into(), "fr".into()])
            .with_fallback(vec![answer("fallback", "/:path*")]);
        let (_, res) = run(&router, &cx, "/fr/about").await;
        assert_eq!(text(&res), "catchall:/fr/about:false");
    }

    #[tokio::test]
    async fn test_page_check_disabled() {
        let cx = TestContext {
            pages: vec!["/about"],
            ..Default::default()
        };
        let router = Router::new(catch_all())
            .with_page_check(false)
            .with_fallback(vec![answer("fallback", "/:path*")]);
        let (_, res) = run(&router, &cx, "/about").await;
        assert_eq!(text(&res), "fallback:/about:true");
    }

    // === Base path and locales ===

    #[tokio::test]
    async fn test_base_path_stripped_for_routes() {
        let router = Router::new(catch_all()).with_base_path("/docs");
        let (finished, res) = run(&router, &TestContext::default(), "/docs/intro").await;
        assert!(finished);
        assert_eq!(text(&res), "catchall:/intro:false");
        let (_, res) = run(&router, &TestContext::default(), "/docs").await;
        assert_eq!(text(&res), "catchall:/:false");
    }

    #[tokio::test]
    async fn test_outside_base_path_is_unrouted() {
        let router = Router::new(catch_all()).with_base_path("/docs");
        let (finished, _) = run(&router, &TestContext::default(), "/intro").await;
        assert!(!finished);
        let (finished, _) = run(&router, &TestContext::default(), "/docsx").await;
        assert!(!finished);
    }

    #[tokio::test]
    async fn test_route_matching_without_locale() {
        let router = Router::new(catch_all())
            .with_locales(vec!["en".into(), "fr".into()])
            .with_fs_routes(vec![answer("about", "/about").matches_locale(true)]);
        let (_, res) = run(&router, &TestContext::default(), "/fr/about").await;
        assert_eq!(text(&res), "about:/about:false");
    }

    #[test]
    fn test_len_counts_catch_all() {
        let router =
            Router::new(catch_all()).with_fs_routes(vec![answer("a", "/a"), answer("b", "/b")]);
        assert_eq!(router.len(), 3);
        assert!(!router.is_empty());
    }

    #[tokio::test]
    async fn test_handler_errors_propagate() {
        struct Fails;

        #[async_trait(?Send)]
        impl RouteHandler<TestContext> for Fails {
            async fn handle(
                &self,
                _cx: &TestContext,
                _req: &RequestAdapter,
                res: &ResponseAdapter,
                _params: &Params,
                _url: &ParsedUrl,
            ) -> Result<RouteResult, TestError> {
                res.set_status(1000)?;
                Ok(RouteResult::next())
            }
        }

        let router = Router::new(catch_all()).with_fs_routes(vec![Route::new(
            "fails",
            RouteKind::Route,
            "/boom",
            Arc::new(Fails),
        )
        .unwrap()]);
        let req = request("/boom");
        let (res, _pending) = ResponseAdapter::new();
        let mut url = ParsedUrl::parse(&req.url());
        let err = router.execute(&TestContext::default(), &req, &res, &mut url).await;
        assert!(matches!(err, Err(TestError::Response(_))));
    }
}
