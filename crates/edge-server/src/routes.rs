//! Filesystem routes and the catch-all render route.

use std::sync::Arc;

use async_trait::async_trait;
use edge_cache::{is_immutable_static_path, IMMUTABLE_CACHE_CONTROL};
use edge_core::{
    join_paths, HeaderAccess, RequestAdapter, ResponseAdapter, NEXT_BUBBLE_NO_FALLBACK,
    NEXT_DATA_REQ, NEXT_DEFAULT_LOCALE, NEXT_LOCALE,
};
use edge_router::i18n::{detect_domain_locale, normalize_locale_path, remove_trailing_slash};
use edge_router::{Params, ParsedUrl, Route, RouteHandler, RouteKind, RouteResult};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{get_route_from_asset_path, RenderError, Server, ServerError, ServerResult};

/// Characters `encodeURI` leaves alone.
const URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// Percent-encode a path the way a browser would put it in a url.
pub(crate) fn encode_uri(path: &str) -> String {
    utf8_percent_encode(path, URI).to_string()
}

fn path_segments(params: &Params) -> Vec<String> {
    params.get("path").map(|p| p.values()).unwrap_or_default()
}

/// The filesystem routes, in order.
pub(crate) async fn fs_routes(server: &Server) -> ServerResult<Vec<Route<Server>>> {
    let mut routes = vec![
        Route::new(
            "_next/static catchall",
            RouteKind::Route,
            "/_next/static/:path*",
            Arc::new(BuildStaticRoute),
        )?,
        Route::new(
            "_next/data catchall",
            RouteKind::Route,
            "/_next/data/:path*",
            Arc::new(DataRoute),
        )?
        .check(true),
        Route::new(
            "_next catchall",
            RouteKind::Route,
            "/_next/:path*",
            Arc::new(NotFoundRoute),
        )?,
    ];
    if !server.public_files().await?.is_empty() {
        routes.push(
            Route::new(
                "public folder catchall",
                RouteKind::Route,
                "/:path*",
                Arc::new(PublicRoute),
            )?
            .matches_base_path(true),
        );
    }
    if server.has_static_dir() {
        routes.push(Route::new(
            "static catchall",
            RouteKind::Route,
            "/static/:path*",
            Arc::new(UserStaticRoute),
        )?);
    }
    Ok(routes)
}

/// The last route of the table: render whatever page the url names.
pub(crate) fn catch_all_route() -> ServerResult<Route<Server>> {
    Ok(Route::new(
        "Catchall render",
        RouteKind::Route,
        "/:path*",
        Arc::new(CatchAllRender),
    )?)
}

/// `/_next/static/*`: fingerprinted build assets.
struct BuildStaticRoute;

#[async_trait(?Send)]
impl RouteHandler<Server> for BuildStaticRoute {
    async fn handle(
        &self,
        cx: &Server,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        params: &Params,
        url: &ParsedUrl,
    ) -> ServerResult<RouteResult> {
        let segments = path_segments(params);
        if segments.is_empty() {
            cx.render404(req, res, &url.query).await?;
            return Ok(RouteResult::finished());
        }

        let path = join_paths(&cx.build_static_dir(), &segments.join("/"));
        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();
        if is_immutable_static_path(&parts, cx.build_id().await?)
            && cx.is_serveable_url(&path).await?
        {
            res.set_header("Cache-Control", IMMUTABLE_CACHE_CONTROL)?;
        }
        cx.serve_static(req, res, &path).await?;
        Ok(RouteResult::finished())
    }
}

/// `/_next/data/<buildId>/<page>.json`: rewritten to the page with the
/// data request flag set.
struct DataRoute;

#[async_trait(?Send)]
impl RouteHandler<Server> for DataRoute {
    async fn handle(
        &self,
        cx: &Server,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        params: &Params,
        url: &ParsedUrl,
    ) -> ServerResult<RouteResult> {
        let mut segments = path_segments(params);
        if segments.first().map(String::as_str) != Some(cx.build_id().await?) {
            cx.render404(req, res, &url.query).await?;
            return Ok(RouteResult::finished());
        }
        segments.remove(0);
        if !segments.last().is_some_and(|last| last.ends_with(".json")) {
            cx.render404(req, res, &url.query).await?;
            return Ok(RouteResult::finished());
        }

        let mut pathname = get_route_from_asset_path(&format!("/{}", segments.join("/")), ".json");
        let mut query = url.query.clone();

        if let Some(i18n) = &cx.config().i18n {
            let hostname = req.hostname();
            let default_locale = detect_domain_locale(&i18n.domains, hostname.as_deref(), None)
                .map(|domain| domain.default_locale.clone())
                .unwrap_or_else(|| i18n.default_locale.clone());
            let localized = normalize_locale_path(&pathname, &i18n.locales);
            query.insert(NEXT_DEFAULT_LOCALE, default_locale.clone());

            match localized.detected_locale {
                Some(locale) => {
                    pathname = localized.pathname;
                    query.insert(NEXT_LOCALE, locale);
                }
                None => {
                    query.insert(NEXT_LOCALE, default_locale);
                    cx.render404(req, res, &query).await?;
                    return Ok(RouteResult::finished());
                }
            }
        }

        query.insert(NEXT_DATA_REQ, "1");
        req.update_meta(|meta| meta.is_data_request = true);
        Ok(RouteResult::rewrite(pathname, query))
    }
}

/// Anything else under `/_next`.
struct NotFoundRoute;

#[async_trait(?Send)]
impl RouteHandler<Server> for NotFoundRoute {
    async fn handle(
        &self,
        cx: &Server,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        _params: &Params,
        url: &ParsedUrl,
    ) -> ServerResult<RouteResult> {
        cx.render404(req, res, &url.query).await?;
        Ok(RouteResult::finished())
    }
}

/// Files of the `public` folder, served from the site root.
struct PublicRoute;

#[async_trait(?Send)]
impl RouteHandler<Server> for PublicRoute {
    async fn handle(
        &self,
        cx: &Server,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        params: &Params,
        _url: &ParsedUrl,
    ) -> ServerResult<RouteResult> {
        let mut segments = path_segments(params);

        let base_path = &cx.config().base_path;
        if !base_path.is_empty() {
            let base: Vec<&str> = base_path.split('/').filter(|s| !s.is_empty()).collect();
            let under_base = segments.len() >= base.len()
                && segments.iter().zip(&base).all(|(segment, part)| segment == part);
            if !under_base {
                return Ok(RouteResult::next());
            }
            segments.drain(..base.len());
        }

        let path = format!("/{}", segments.join("/"));
        let public = cx.public_files().await?;
        if !public.contains(&path) && !public.contains(&encode_uri(&path)) {
            return Ok(RouteResult::next());
        }

        cx.serve_static(req, res, &join_paths(&cx.public_dir(), &segments.join("/")))
            .await?;
        Ok(RouteResult::finished())
    }
}

/// The legacy `static/` folder at the project root.
struct UserStaticRoute;

#[async_trait(?Send)]
impl RouteHandler<Server> for UserStaticRoute {
    async fn handle(
        &self,
        cx: &Server,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        params: &Params,
        _url: &ParsedUrl,
    ) -> ServerResult<RouteResult> {
        let path = join_paths(&cx.user_static_dir(), &path_segments(params).join("/"));
        cx.serve_static(req, res, &path).await?;
        Ok(RouteResult::finished())
    }
}

/// Render the page, or run the API route, named by the pathname.
struct CatchAllRender;

#[async_trait(?Send)]
impl RouteHandler<Server> for CatchAllRender {
    async fn handle(
        &self,
        cx: &Server,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        _params: &Params,
        url: &ParsedUrl,
    ) -> ServerResult<RouteResult> {
        let mut pathname = remove_trailing_slash(&url.pathname).to_string();
        let mut query = url.query.clone();

        if let Some(i18n) = &cx.config().i18n {
            let localized = normalize_locale_path(&pathname, &i18n.locales);
            let locale = match localized.detected_locale {
                Some(locale) => {
                    pathname = localized.pathname;
                    req.update_meta(|meta| meta.did_strip_locale = true);
                    locale
                }
                None => match query.get(NEXT_LOCALE).filter(|l| !l.is_empty()) {
                    Some(locale) => locale.to_string(),
                    None => {
                        let hostname = req.hostname();
                        detect_domain_locale(&i18n.domains, hostname.as_deref(), None)
                            .map(|domain| domain.default_locale.clone())
                            .unwrap_or_else(|| i18n.default_locale.clone())
                    }
                },
            };
            query.insert(NEXT_LOCALE, locale.clone());
            if !query.contains(NEXT_DEFAULT_LOCALE) {
                query.insert(NEXT_DEFAULT_LOCALE, i18n.default_locale.clone());
            }
            req.update_meta(|meta| meta.locale = Some(locale));
        }

        let bubble_no_fallback = query.remove(NEXT_BUBBLE_NO_FALLBACK).is_some();

        if pathname == "/api" || pathname.starts_with("/api/") {
            if cx.handle_api(req, res, &pathname, &query).await? {
                return Ok(RouteResult::finished());
            }
        }

        match cx.render(req, res, &pathname, &query, bubble_no_fallback).await {
            Ok(()) => Ok(RouteResult::finished()),
            Err(ServerError::Render(RenderError::NoFallback)) if bubble_no_fallback => {
                Ok(RouteResult::next())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uri_keeps_reserved_characters() {
        assert_eq!(encode_uri("/a b/c.txt"), "/a%20b/c.txt");
        assert_eq!(encode_uri("/q?x=1&y=2#h"), "/q?x=1&y=2#h");
        assert_eq!(encode_uri("/café.png"), "/caf%C3%A9.png");
    }

    #[test]
    fn test_path_segments() {
        let mut params = Params::new();
        assert!(path_segments(&params).is_empty());
        params.insert(
            "path".into(),
            edge_router::ParamValue::Multi(vec!["chunks".into(), "main.js".into()]),
        );
        assert_eq!(path_segments(&params), ["chunks", "main.js"]);
    }
}
