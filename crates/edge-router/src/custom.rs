//! Custom routes from the routes manifest: headers, redirects, rewrites.

use std::sync::Arc;

use async_trait::async_trait;
use edge_assets::{HeaderEntry, HeaderRule, RedirectRule, RewriteRule};
use edge_core::{BodyWriter, HeaderAccess, RequestAdapter, ResponseAdapter, StatusHolder};

use crate::{
    compile_non_path, normalize_repeated_slashes, prepare_destination, Params, ParsedUrl, Route,
    RouteError, RouteHandler, RouteKind, RouteResult, RouterContext,
};

/// Sets headers and lets routing continue.
#[derive(Debug, Clone)]
pub struct HeaderRoute {
    headers: Vec<HeaderEntry>,
}

impl HeaderRoute {
    pub fn route<C: RouterContext>(rule: &HeaderRule) -> Result<Route<C>, RouteError> {
        let handler = Arc::new(HeaderRoute {
            headers: rule.headers.clone(),
        });
        Ok(Route::new(
            format!("{} header route", rule.source),
            RouteKind::Header,
            &rule.source,
            handler,
        )?
        .with_conditions(rule.has.clone(), rule.missing.clone()))
    }
}

#[async_trait(?Send)]
impl<C: RouterContext> RouteHandler<C> for HeaderRoute {
    async fn handle(
        &self,
        _cx: &C,
        _req: &RequestAdapter,
        res: &ResponseAdapter,
        params: &Params,
        _url: &ParsedUrl,
    ) -> Result<RouteResult, C::Error> {
        for header in &self.headers {
            let key = compile_non_path(&header.key, params);
            let value = compile_non_path(&header.value, params);
            res.set_header(&key, value)?;
        }
        Ok(RouteResult::next())
    }
}

/// Answers with a redirect.
#[derive(Debug, Clone)]
pub struct RedirectRoute {
    destination: String,
    status: u16,
}

impl RedirectRoute {
    /// Redirects that are not internal never match under `restricted`
    /// (the `/_next` tree).
    pub fn route<C: RouterContext>(
        rule: &RedirectRule,
        restricted: &[String],
    ) -> Result<Route<C>, RouteError> {
        let handler = Arc::new(RedirectRoute {
            destination: rule.destination.clone(),
            status: rule.status(),
        });
        let mut route = Route::new(
            format!("Redirect route {}", rule.source),
            RouteKind::Redirect,
            &rule.source,
            handler,
        )?
        .with_conditions(rule.has.clone(), rule.missing.clone());
        if !rule.internal {
            route.matcher = route.matcher.with_restricted(restricted.to_vec());
        }
        Ok(route)
    }
}

#[async_trait(?Send)]
impl<C: RouterContext> RouteHandler<C> for RedirectRoute {
    async fn handle(
        &self,
        _cx: &C,
        _req: &RequestAdapter,
        res: &ResponseAdapter,
        params: &Params,
        url: &ParsedUrl,
    ) -> Result<RouteResult, C::Error> {
        let prepared = prepare_destination(&self.destination, params, &url.query, false)?;
        let mut location = prepared.to_url();
        if location.starts_with('/') {
            location = normalize_repeated_slashes(&location);
        }

        res.set_status(self.status)?;
        res.set_header("Location", location.as_str())?;
        if self.status == 308 {
            res.set_header("Refresh", format!("0;url={location}"))?;
        }
        res.body(location)?;
        res.send();
        Ok(RouteResult::finished())
    }
}

/// Rewrites the pathname, or proxies when the destination is external.
#[derive(Debug, Clone)]
pub struct RewriteRoute {
    destination: String,
}

impl RewriteRoute {
    /// `check` re-runs filesystem routes and the page check on the
    /// rewritten pathname.
    pub fn route<C: RouterContext>(
        rule: &RewriteRule,
        check: bool,
    ) -> Result<Route<C>, RouteError> {
        let handler = Arc::new(RewriteRoute {
            destination: rule.destination.clone(),
        });
        Ok(Route::new(
            format!("Rewrite route {}", rule.source),
            RouteKind::Rewrite,
            &rule.source,
            handler,
        )?
        .with_conditions(rule.has.clone(), rule.missing.clone())
        .check(check))
    }
}

#[async_trait(?Send)]
impl<C: RouterContext> RouteHandler<C> for RewriteRoute {
    async fn handle(
        &self,
        cx: &C,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        params: &Params,
        url: &ParsedUrl,
    ) -> Result<RouteResult, C::Error> {
        let prepared = prepare_destination(&self.destination, params, &url.query, true)?;
        if prepared.is_external() {
            cx.proxy(req, res, &prepared.to_url()).await?;
            return Ok(RouteResult::finished());
        }
        Ok(RouteResult::rewrite(prepared.pathname, prepared.query))
    }
}
