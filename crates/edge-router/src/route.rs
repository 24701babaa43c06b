//! Route definitions.

use std::sync::Arc;

use async_trait::async_trait;
use edge_assets::RouteHas;
use edge_core::{Query, RequestAdapter, ResponseAdapter, ResponseError};

use crate::{Params, PathMatcher, RouteError};

/// Pathname and query as seen by the route being evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    pub pathname: String,
    pub query: Query,
}

impl ParsedUrl {
    pub fn new(pathname: impl Into<String>, query: Query) -> Self {
        Self {
            pathname: pathname.into(),
            query,
        }
    }

    /// Split a request url (path and query).
    pub fn parse(url: &str) -> Self {
        let (pathname, search) = url.split_once('?').unwrap_or((url, ""));
        let pathname = if pathname.is_empty() { "/" } else { pathname };
        Self::new(pathname, Query::parse(search))
    }

    pub fn to_url(&self) -> String {
        let search = self.query.to_query_string();
        if search.is_empty() {
            self.pathname.clone()
        } else {
            format!("{}?{}", self.pathname, search)
        }
    }
}

/// What a route handler decided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteResult {
    /// The response has been produced; stop routing.
    pub finished: bool,
    /// Continue with this pathname.
    pub pathname: Option<String>,
    /// Continue with this query, merged over the internal keys of the
    /// current one.
    pub query: Option<Query>,
}

impl RouteResult {
    pub fn finished() -> Self {
        Self {
            finished: true,
            ..Default::default()
        }
    }

    pub fn next() -> Self {
        Self::default()
    }

    pub fn rewrite(pathname: impl Into<String>, query: Query) -> Self {
        Self {
            finished: false,
            pathname: Some(pathname.into()),
            query: Some(query),
        }
    }
}

/// Kind of route, which decides how the pathname is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Header,
    Redirect,
    Rewrite,
    Route,
}

impl RouteKind {
    /// Custom routes from the routes manifest match the full pathname,
    /// base path and locale included.
    pub fn is_custom(self) -> bool {
        !matches!(self, RouteKind::Route)
    }
}

/// Services the router needs from its owner.
#[async_trait(?Send)]
pub trait RouterContext {
    type Error: From<ResponseError> + From<RouteError>;

    /// Whether a non-dynamic page exists for `pathname`.
    async fn has_page(&self, pathname: &str) -> Result<bool, Self::Error>;

    /// Forward the request to an external rewrite destination and send the
    /// upstream reply.
    async fn proxy(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        target_url: &str,
    ) -> Result<(), Self::Error>;
}

/// Route behaviour.
#[async_trait(?Send)]
pub trait RouteHandler<C: RouterContext> {
    async fn handle(
        &self,
        cx: &C,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        params: &Params,
        url: &ParsedUrl,
    ) -> Result<RouteResult, C::Error>;
}

/// One entry of the route table.
pub struct Route<C: RouterContext> {
    pub name: String,
    pub kind: RouteKind,
    pub matcher: PathMatcher,
    pub has: Vec<RouteHas>,
    pub missing: Vec<RouteHas>,
    /// Match against the pathname with the base path kept.
    pub matches_base_path: bool,
    /// Match against the pathname with any locale prefix removed.
    pub matches_locale: bool,
    /// After a rewrite, re-check filesystem routes and pages.
    pub check: bool,
    pub handler: Arc<dyn RouteHandler<C>>,
}

impl<C: RouterContext> Route<C> {
    pub fn new(
        name: impl Into<String>,
        kind: RouteKind,
        pattern: &str,
        handler: Arc<dyn RouteHandler<C>>,
    ) -> Result<Self, RouteError> {
        Ok(Self {
            name: name.into(),
            kind,
            matcher: PathMatcher::compile(pattern)?,
            has: Vec::new(),
            missing: Vec::new(),
            matches_base_path: kind.is_custom(),
            matches_locale: false,
            check: false,
            handler,
        })
    }

    pub fn with_conditions(mut self, has: Vec<RouteHas>, missing: Vec<RouteHas>) -> Self {
        self.has = has;
        self.missing = missing;
        self
    }

    pub fn matches_base_path(mut self, yes: bool) -> Self {
        self.matches_base_path = yes;
        self
    }

    pub fn matches_locale(mut self, yes: bool) -> Self {
        self.matches_locale = yes;
        self
    }

    pub fn check(mut self, yes: bool) -> Self {
        self.check = yes;
        self
    }
}

impl<C: RouterContext> std::fmt::Debug for Route<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("source", &self.matcher.source())
            .field("check", &self.check)
            .finish_non_exhaustive()
    }
}
