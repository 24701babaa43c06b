//! The server orchestrator.
//!
//! One [`Server`] is built per process from the configuration and the
//! asset bundle. Everything derived from the bundle (build id, manifests,
//! the serveable path set, the route table) is computed on first use and
//! shared by every later request.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use edge_assets::manifest::paths;
use edge_assets::{
    AssetStore, PrerenderDynamicRoute, PrerenderManifest, RoutesManifest, VirtualFs,
};
use edge_cache::PayloadCachePolicy;
use edge_core::{
    join_paths, BodyWriter, ClientInfo, HeaderAccess, Lifecycle, LifecycleEvent, LifecyclePhase,
    Query, RequestAdapter, ResponseAdapter, ResponseBody, ServerConfig, StatusHolder, Target,
    NEXT_DATA_REQ, NEXT_DEFAULT_LOCALE, NEXT_LOCALE,
};
use edge_data::{
    default_fetcher, default_timer, with_timeout, Fetcher, ProxyClient, TimeoutConfig, Timer,
};
use edge_observability::StructuredLogger;
use edge_router::{
    dynamic_routes, is_dynamic_route, DynamicRoute, HeaderRoute, ParsedUrl, RedirectRoute,
    RewriteRoute, Router, RouterContext,
};
use edge_security::{BackendRegistry, ProxyLimits, ServeablePaths};
use tokio::sync::OnceCell;

use crate::api::handle_api_request;
use crate::compress::compress_response;
use crate::routes::{catch_all_route, fs_routes};
use crate::{
    normalize_page_path, send_render_result, serve_static, FoundComponents, PageComponent,
    PageLoader, PayloadOptions, PayloadType, RenderError, RenderOpts, RenderResult, Renderer,
    ServerError, ServerResult, StaticOptions,
};

/// Pages that exist in every build but are never served directly.
const BLOCKED_PAGES: &[&str] = &["/_app", "/_document", "/_error"];

/// Whether `pathname` names one of the internal pages.
pub fn is_blocked_page(pathname: &str) -> bool {
    BLOCKED_PAGES.contains(&pathname)
}

/// Prerender manifest key of `pathname`: locale-prefixed when a locale is
/// set.
fn prerender_key(pathname: &str, locale: Option<&str>) -> String {
    match locale {
        Some(locale) if pathname == "/" => format!("/{locale}"),
        Some(locale) => format!("/{locale}{pathname}"),
        None => pathname.to_string(),
    }
}

/// Collects what a [`Server`] is built from.
pub struct ServerBuilder {
    config: ServerConfig,
    assets: AssetStore,
    renderer: Arc<dyn Renderer>,
    fetcher: Option<Arc<dyn Fetcher>>,
    timer: Option<Arc<dyn Timer>>,
    logger: StructuredLogger,
    lifecycle: Lifecycle,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig, assets: AssetStore, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            config,
            assets,
            renderer,
            fetcher: None,
            timer: None,
            logger: StructuredLogger::new(),
            lifecycle: Lifecycle::default(),
        }
    }

    /// Outbound HTTP used for proxied rewrites. Defaults to the platform's.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Validate the configuration and build the server.
    ///
    /// `/_document` and `/_app` are loaded up front; a failure there is
    /// logged and otherwise ignored.
    pub fn build(self) -> ServerResult<Server> {
        self.config.validate()?;

        let vfs = Arc::new(VirtualFs::new(self.assets, &self.config.dir));
        let loader = PageLoader::new(vfs.clone(), &self.config);
        let timer = self.timer.unwrap_or_else(default_timer);
        let proxy = ProxyClient::new(
            BackendRegistry::from_config(&self.config.backends),
            self.fetcher.unwrap_or_else(default_fetcher),
        )
        .with_limits(ProxyLimits::from(&self.config.proxy))
        .with_timer(timer.clone());

        let server = Server {
            dist_path: self.config.dist_path(),
            config: self.config,
            vfs,
            loader,
            renderer: self.renderer,
            proxy,
            timer,
            logger: self.logger,
            lifecycle: self.lifecycle,
            build_id: OnceCell::new(),
            routes_manifest: OnceCell::new(),
            prerender_manifest: OnceCell::new(),
            fs_paths: OnceCell::new(),
            public_files: OnceCell::new(),
            dynamic_routes: OnceCell::new(),
            router: OnceCell::new(),
        };
        server.prewarm();
        Ok(server)
    }
}

/// Routes, serves and renders requests against one build.
pub struct Server {
    config: ServerConfig,
    dist_path: String,
    vfs: Arc<VirtualFs>,
    loader: PageLoader,
    renderer: Arc<dyn Renderer>,
    proxy: ProxyClient,
    timer: Arc<dyn Timer>,
    logger: StructuredLogger,
    lifecycle: Lifecycle,
    build_id: OnceCell<String>,
    routes_manifest: OnceCell<Arc<RoutesManifest>>,
    prerender_manifest: OnceCell<Arc<PrerenderManifest>>,
    fs_paths: OnceCell<Arc<ServeablePaths>>,
    public_files: OnceCell<Arc<HashSet<String>>>,
    dynamic_routes: OnceCell<Arc<Vec<DynamicRoute>>>,
    router: OnceCell<Router<Server>>,
}

impl Server {
    pub fn builder(
        config: ServerConfig,
        assets: AssetStore,
        renderer: Arc<dyn Renderer>,
    ) -> ServerBuilder {
        ServerBuilder::new(config, assets, renderer)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn vfs(&self) -> &VirtualFs {
        &self.vfs
    }

    pub fn loader(&self) -> &PageLoader {
        &self.loader
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    fn prewarm(&self) {
        if self.config.target == Target::Serverless {
            return;
        }
        for page in ["/_document", "/_app"] {
            if let Err(e) = self.loader.require_page(page) {
                self.logger
                    .warn_builder("failed to pre-load page")
                    .field("page", page)
                    .field("error", e.to_string())
                    .emit();
            }
        }
    }

    /// Whether responses are compressed. Serverless builds leave it to
    /// the platform.
    pub fn compression(&self) -> bool {
        self.config.compress && self.config.target == Target::Server
    }

    fn payload_options(&self) -> PayloadOptions {
        PayloadOptions {
            generate_etags: self.config.generate_etags,
            powered_by_header: self.config.powered_by_header,
        }
    }

    pub(crate) fn public_dir(&self) -> String {
        join_paths(&self.config.dir, paths::PUBLIC_DIR)
    }

    pub(crate) fn user_static_dir(&self) -> String {
        join_paths(&self.config.dir, paths::STATIC_DIR)
    }

    pub(crate) fn build_static_dir(&self) -> String {
        join_paths(&self.dist_path, paths::STATIC_DIR)
    }

    pub(crate) fn has_static_dir(&self) -> bool {
        self.vfs.directory_exists(&self.user_static_dir())
    }

    // === Memoised build data ===

    /// Contents of `BUILD_ID`, trimmed.
    pub async fn build_id(&self) -> ServerResult<&str> {
        let id = self
            .build_id
            .get_or_try_init(|| async {
                let path = join_paths(&self.dist_path, paths::BUILD_ID);
                match self.vfs.read_file_as_string(&path) {
                    Ok(id) => Ok(id.trim().to_string()),
                    Err(e) if e.is_not_found() => {
                        Err(ServerError::NoBuild(self.config.dist_dir.clone()))
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        Ok(id)
    }

    /// Custom routes. A build without a routes manifest has none.
    pub async fn routes_manifest(&self) -> ServerResult<Arc<RoutesManifest>> {
        self.routes_manifest
            .get_or_try_init(|| async {
                let path = join_paths(&self.dist_path, paths::ROUTES_MANIFEST);
                match self.vfs.read_manifest::<RoutesManifest>(&path) {
                    Ok(manifest) => Ok(Arc::new(manifest)),
                    Err(e) if e.is_not_found() => Ok(Arc::default()),
                    Err(e) => Err(ServerError::from(e)),
                }
            })
            .await
            .cloned()
    }

    pub async fn prerender_manifest(&self) -> ServerResult<Arc<PrerenderManifest>> {
        self.prerender_manifest
            .get_or_try_init(|| async {
                let path = join_paths(&self.dist_path, paths::PRERENDER_MANIFEST);
                match self.vfs.read_manifest::<PrerenderManifest>(&path) {
                    Ok(manifest) => Ok(Arc::new(manifest)),
                    Err(e) if e.is_not_found() => Ok(Arc::default()),
                    Err(e) => Err(ServerError::from(e)),
                }
            })
            .await
            .cloned()
    }

    /// Every file a static route may serve: the user `static/` and
    /// `public/` folders, and the build's `static/` folder outside
    /// minimal mode.
    pub async fn fs_paths(&self) -> ServerResult<Arc<ServeablePaths>> {
        self.fs_paths
            .get_or_try_init(|| async {
                let mut keys = Vec::new();
                if self.has_static_dir() {
                    keys.extend(self.vfs.list_directory(&self.user_static_dir()));
                }
                keys.extend(self.vfs.list_directory(&self.public_dir()));
                if !self.config.minimal_mode {
                    keys.extend(self.vfs.list_directory(&self.build_static_dir()));
                }
                Ok::<_, ServerError>(Arc::new(ServeablePaths::new(keys)))
            })
            .await
            .cloned()
    }

    /// Public files as url paths, percent-encoded the way browsers send
    /// them.
    pub async fn public_files(&self) -> ServerResult<Arc<HashSet<String>>> {
        self.public_files
            .get_or_try_init(|| async {
                let public_key = self.vfs.key_for(&self.public_dir());
                let files = self
                    .vfs
                    .list_directory(&self.public_dir())
                    .into_iter()
                    .filter_map(|key| {
                        key.strip_prefix(public_key.as_str())
                            .map(crate::routes::encode_uri)
                    })
                    .collect();
                Ok::<_, ServerError>(Arc::new(files))
            })
            .await
            .cloned()
    }

    /// Dynamic pages of the pages manifest, most specific first.
    pub async fn dynamic_routes(&self) -> ServerResult<Arc<Vec<DynamicRoute>>> {
        self.dynamic_routes
            .get_or_try_init(|| async {
                if !self.config.use_file_system_public_routes {
                    return Ok(Arc::new(Vec::new()));
                }
                let manifest = self.loader.pages_manifest()?;
                let routes = dynamic_routes(manifest.keys().map(String::as_str))?;
                Ok::<_, ServerError>(Arc::new(routes))
            })
            .await
            .cloned()
    }

    /// The route table, built on first use.
    pub async fn router(&self) -> ServerResult<&Router<Server>> {
        self.router.get_or_try_init(|| self.build_router()).await
    }

    async fn build_router(&self) -> ServerResult<Router<Server>> {
        let manifest = self.routes_manifest().await?;
        let base_path = &self.config.base_path;
        let restricted = vec![format!("{base_path}/_next")];

        let (headers, redirects) = if self.config.minimal_mode {
            (Vec::new(), Vec::new())
        } else {
            (
                manifest
                    .headers
                    .iter()
                    .map(HeaderRoute::route::<Server>)
                    .collect::<Result<Vec<_>, _>>()?,
                manifest
                    .redirects
                    .iter()
                    .map(|rule| RedirectRoute::route::<Server>(rule, &restricted))
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };
        let rewrites = |rules: &[edge_assets::RewriteRule], check: bool| {
            rules
                .iter()
                .map(|rule| RewriteRoute::route::<Server>(rule, check))
                .collect::<Result<Vec<_>, _>>()
        };

        let router = Router::new(catch_all_route()?)
            .with_headers(headers)
            .with_redirects(redirects)
            .with_before_files(rewrites(&manifest.rewrites.before_files, false)?)
            .with_fs_routes(fs_routes(self).await?)
            .with_after_files(rewrites(&manifest.rewrites.after_files, true)?)
            .with_fallback(rewrites(&manifest.rewrites.fallback, true)?)
            .with_dynamic_routes(self.dynamic_routes().await?.as_ref().clone())
            .with_page_check(self.config.use_file_system_public_routes)
            .with_base_path(base_path.clone())
            .with_locales(self.config.locales().to_vec());

        self.logger
            .debug_builder("route table built")
            .field_i64("routes", router.len() as i64)
            .emit();
        Ok(router)
    }

    // === Request handling ===

    /// Handle one platform request end to end.
    pub async fn handle(
        &self,
        request: http::Request<Bytes>,
        client: ClientInfo,
    ) -> ServerResult<http::Response<ResponseBody>> {
        let req = RequestAdapter::from_platform(request, client);
        let logger = self.logger.for_request(req.id());
        let method = req.method().to_string();
        let url = req.url();
        self.lifecycle.run(&LifecycleEvent::new(
            LifecyclePhase::FetchEvent,
            req.id().clone(),
            &method,
            &url,
        ));

        let (res, pending) = ResponseAdapter::new();
        res.set_compress(self.compression());

        if let Err(err) = self.run(&req, &res).await {
            let status = err.status();
            logger
                .error_builder("request failed")
                .field("url", url.as_str())
                .field("error", err.to_string())
                .field_i64("status", i64::from(status))
                .emit();
            self.lifecycle.run(
                &LifecycleEvent::new(LifecyclePhase::Error, req.id().clone(), &method, &url)
                    .with_status(status)
                    .with_error(err.to_string())
                    .with_elapsed(req.timing().elapsed()),
            );
            self.render_error(&req, &res, Some(&err), status, &req.query())
                .await?;
        }

        res.send();
        let materialized = pending.materialize().await?;
        let mut response = materialized.response;
        if materialized.compress {
            response = compress_response(response, req.header("accept-encoding"))?;
        }

        req.mark("complete");
        let elapsed = req.timing().elapsed();
        let status = response.status().as_u16();
        logger
            .info_builder("request complete")
            .field("method", method.as_str())
            .field("url", url.as_str())
            .field_i64("status", i64::from(status))
            .duration_ms("duration_ms", elapsed)
            .emit();
        self.lifecycle.run(
            &LifecycleEvent::new(LifecyclePhase::Completion, req.id().clone(), &method, &url)
                .with_status(status)
                .with_elapsed(elapsed),
        );
        Ok(response)
    }

    async fn run(&self, req: &RequestAdapter, res: &ResponseAdapter) -> ServerResult<()> {
        if req.is_upgrade() {
            return Err(ServerError::UpgradeNotSupported);
        }
        let router = self.router().await?;
        let mut url = ParsedUrl::parse(&req.url());
        if !router.execute(self, req, res, &mut url).await? {
            self.render404(req, res, &url.query).await?;
        }
        Ok(())
    }

    /// Whether `path` is one of the enumerated static files once decoded
    /// and normalised.
    pub async fn is_serveable_url(&self, path: &str) -> ServerResult<bool> {
        Ok(self.fs_paths().await?.is_serveable_url(&self.vfs, path))
    }

    /// Serve a build or public file.
    ///
    /// Paths outside the enumerated static files answer 404, methods other
    /// than GET and HEAD answer 405.
    pub async fn serve_static(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        path: &str,
    ) -> ServerResult<()> {
        if !self.is_serveable_url(path).await? {
            return self.render404(req, res, &req.query()).await;
        }
        if req.method() != http::Method::GET && req.method() != http::Method::HEAD {
            let err = ServerError::MethodNotAllowed(req.method().to_string());
            return self.render_error(req, res, Some(&err), 405, &req.query()).await;
        }
        let options = StaticOptions {
            compress: self.compression(),
            generate_etags: self.config.generate_etags,
        };
        match serve_static(&self.vfs, req, res, path, options) {
            Err(e) if e.is_not_found() => self.render404(req, res, &req.query()).await,
            other => other,
        }
    }

    /// Run the API route for `pathname`. Returns `false` when there is
    /// none.
    pub async fn handle_api(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        pathname: &str,
        query: &Query,
    ) -> ServerResult<bool> {
        let routes = self.dynamic_routes().await?;
        let logger = self.logger.for_request(req.id()).with_route(pathname);
        handle_api_request(&self.loader, &routes, &logger, req, res, pathname, query).await
    }

    // === Rendering ===

    /// Render the page for `pathname`, falling back to the dynamic routes.
    ///
    /// With `bubble_no_fallback`, a dynamic page without a fallback for
    /// this path returns [`RenderError::NoFallback`] so routing can move on
    /// to the `fallback` rewrites; otherwise it renders 404.
    pub async fn render(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        pathname: &str,
        query: &Query,
        bubble_no_fallback: bool,
    ) -> ServerResult<()> {
        if is_blocked_page(pathname) {
            return self.render404(req, res, query).await;
        }
        let Some(found) = self.find_components(pathname, query).await? else {
            return self.render404(req, res, query).await;
        };
        match self.render_components(req, res, pathname, found).await {
            Err(ServerError::Render(RenderError::NotFound)) => {
                self.render404(req, res, query).await
            }
            Err(ServerError::Render(RenderError::NoFallback)) if !bubble_no_fallback => {
                self.render404(req, res, query).await
            }
            other => other,
        }
    }

    async fn find_components(
        &self,
        pathname: &str,
        query: &Query,
    ) -> ServerResult<Option<FoundComponents>> {
        if let Some(found) = self.loader.find_page_components(pathname, query, None, false)? {
            return Ok(Some(found));
        }
        for route in self.dynamic_routes().await?.iter() {
            let Some(params) = route.matches(pathname) else {
                continue;
            };
            let found =
                self.loader
                    .find_page_components(route.page(), query, Some(&params), false)?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    async fn render_components(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        pathname: &str,
        found: FoundComponents,
    ) -> ServerResult<()> {
        let FoundComponents { components, query } = found;
        let exports = components.exports;
        let has_data = exports.get_static_props || exports.get_server_side_props;
        let is_data_request = query.contains(NEXT_DATA_REQ);
        if is_data_request && !has_data {
            return Err(RenderError::NotFound.into());
        }
        let kind = if is_data_request {
            PayloadType::Json
        } else {
            PayloadType::Html
        };

        if let PageComponent::StaticHtml(html) = &components.component {
            let result = RenderResult::from_string(html.clone());
            return send_render_result(req, res, result, PayloadType::Html, self.payload_options());
        }

        let locale = query.get(NEXT_LOCALE).filter(|l| !l.is_empty());
        if exports.get_static_props {
            let manifest = self.prerender_manifest().await?;
            let key = prerender_key(pathname, locale);
            if manifest.is_not_found(&key) {
                return Err(RenderError::NotFound.into());
            }
            if let Some(result) = self.prerendered(&manifest, &key, is_data_request)? {
                return send_render_result(req, res, result, kind, self.payload_options());
            }
            if is_dynamic_route(&components.page) {
                let dynamic = manifest.dynamic_routes.get(&components.page);
                if dynamic.is_some_and(PrerenderDynamicRoute::has_no_fallback) {
                    return Err(RenderError::NoFallback.into());
                }
                let blocking = dynamic.is_some_and(PrerenderDynamicRoute::is_blocking);
                if !is_data_request && !blocking {
                    if let Some(html) = self.get_fallback(&components.page)? {
                        let result = RenderResult::from_string(html)
                            .with_cache(PayloadCachePolicy::private());
                        return send_render_result(req, res, result, kind, self.payload_options());
                    }
                }
            }
        }

        let build_id = self.build_id().await?;
        let opts = RenderOpts {
            components: &components,
            build_id,
            base_path: &self.config.base_path,
            locale,
            default_locale: self.default_locale(&query),
            locales: self.config.locales(),
            is_data_request,
            status: 200,
            error: None,
        };
        if let Some(result) = self.call_renderer(req, res, pathname, &query, &opts).await? {
            send_render_result(req, res, result, kind, self.payload_options())?;
        }
        Ok(())
    }

    fn default_locale<'a>(&'a self, query: &'a Query) -> Option<&'a str> {
        query
            .get(NEXT_DEFAULT_LOCALE)
            .or_else(|| self.config.i18n.as_ref().map(|i18n| i18n.default_locale.as_str()))
    }

    async fn call_renderer(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        pathname: &str,
        query: &Query,
        opts: &RenderOpts<'_>,
    ) -> ServerResult<Option<RenderResult>> {
        let render = self.renderer.render(req, res, pathname, query, opts);
        let Some(ms) = self.config.render_timeout_ms else {
            return Ok(render.await?);
        };
        let total = Duration::from_millis(ms);
        with_timeout(self.timer.as_ref(), TimeoutConfig::from_total(total), render)
            .await
            .map_err(|_| ServerError::RenderTimeout(total))?
            .map_err(Into::into)
    }

    /// Pre-rendered payload under `key` from the build output, when the
    /// prerender manifest lists it.
    fn prerendered(
        &self,
        manifest: &PrerenderManifest,
        key: &str,
        is_data_request: bool,
    ) -> ServerResult<Option<RenderResult>> {
        let Some(route) = manifest.routes.get(key) else {
            return Ok(None);
        };

        let ext = if is_data_request { "json" } else { "html" };
        let path = join_paths(
            self.loader.server_path(),
            &format!("pages{}.{ext}", normalize_page_path(key)?),
        );
        let payload = match self.vfs.read_file_as_string(&path) {
            Ok(payload) => payload.into_owned(),
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let policy = match route.initial_revalidate_seconds.seconds() {
            Some(seconds) => PayloadCachePolicy::revalidate(seconds),
            None => PayloadCachePolicy::never(),
        };
        tracing::debug!(route = %key, "serving pre-rendered payload");
        Ok(Some(RenderResult::from_string(payload).with_cache(policy)))
    }

    /// Fallback HTML emitted for a dynamic page, if the build has one.
    pub fn get_fallback(&self, page: &str) -> ServerResult<Option<String>> {
        let path = join_paths(
            self.loader.server_path(),
            &format!("pages{}.html", normalize_page_path(page)?),
        );
        match self.vfs.read_file_as_string(&path) {
            Ok(html) => Ok(Some(html.into_owned())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // === Error pages ===

    pub async fn render404(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        query: &Query,
    ) -> ServerResult<()> {
        self.render_error(req, res, None, 404, query).await
    }

    /// Answer with `status` through the error pages.
    ///
    /// 404 uses `/404`, other statuses `/500`, then `/_error`. Without an
    /// error page, or when rendering it fails, a plain text body is sent.
    pub async fn render_error(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        err: Option<&ServerError>,
        status: u16,
        query: &Query,
    ) -> ServerResult<()> {
        if res.is_sent() {
            return Ok(());
        }
        res.set_status(status)?;
        if status == 405 {
            res.set_header("Allow", "GET, HEAD")?;
        }

        let message = err.map(ToString::to_string);
        match self.render_error_page(req, res, status, message.as_deref(), query).await {
            Ok(true) => Ok(()),
            Ok(false) => self.send_plain_error(res, status),
            Err(e) => {
                self.logger
                    .for_request(req.id())
                    .warn_builder("failed to render error page")
                    .field("error", e.to_string())
                    .field_i64("status", i64::from(status))
                    .emit();
                if res.is_sent() {
                    return Ok(());
                }
                self.send_plain_error(res, status)
            }
        }
    }

    async fn render_error_page(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        status: u16,
        error: Option<&str>,
        query: &Query,
    ) -> ServerResult<bool> {
        if self.config.target == Target::Serverless {
            return Ok(false);
        }
        let pages: &[&str] = if status == 404 {
            &["/404", "/_error"]
        } else {
            &["/500", "/_error"]
        };

        let mut query = query.clone();
        query.remove(NEXT_DATA_REQ);
        for page in pages {
            let Some(found) = self.loader.find_page_components(page, &query, None, false)? else {
                continue;
            };
            if let PageComponent::StaticHtml(html) = &found.components.component {
                let result = RenderResult::from_string(html.clone());
                send_render_result(req, res, result, PayloadType::Html, self.payload_options())?;
                return Ok(true);
            }

            let build_id = self.build_id().await?;
            let opts = RenderOpts {
                components: &found.components,
                build_id,
                base_path: &self.config.base_path,
                locale: found.query.get(NEXT_LOCALE),
                default_locale: self.default_locale(&found.query),
                locales: self.config.locales(),
                is_data_request: false,
                status,
                error,
            };
            match self.call_renderer(req, res, page, &found.query, &opts).await {
                Ok(Some(result)) => {
                    let options = self.payload_options();
                    send_render_result(req, res, result, PayloadType::Html, options)?;
                    return Ok(true);
                }
                Ok(None) => return Ok(true),
                Err(ServerError::Render(RenderError::NotFound)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    fn send_plain_error(&self, res: &ResponseAdapter, status: u16) -> ServerResult<()> {
        let message = match status {
            404 => "This page could not be found",
            _ => http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Internal Server Error"),
        };
        res.set_header("Content-Type", "text/plain; charset=utf-8")?;
        res.body(format!("{status}: {message}"))?;
        res.send();
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("loader", &self.loader)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

#[async_trait(?Send)]
impl RouterContext for Server {
    type Error = ServerError;

    async fn has_page(&self, pathname: &str) -> ServerResult<bool> {
        self.loader.has_page(pathname, self.config.locales())
    }

    async fn proxy(
        &self,
        req: &RequestAdapter,
        res: &ResponseAdapter,
        target_url: &str,
    ) -> ServerResult<()> {
        self.logger
            .for_request(req.id())
            .debug_builder("proxying rewrite")
            .field("target", target_url)
            .emit();
        Ok(self.proxy.forward(req, res, target_url).await?)
    }
}
