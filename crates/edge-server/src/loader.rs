//! Page and component loading from the build output.

use std::sync::{Arc, OnceLock};

use edge_assets::manifest::paths;
use edge_assets::{AssetError, BuildManifest, PagesManifest, VirtualFs};
use edge_core::{
    join_paths, ModuleExports, ModuleRef, PageConfig, Query, ServerConfig, Target, AMP,
    NEXT_DATA_REQ, NEXT_DEFAULT_LOCALE, NEXT_LOCALE,
};
use edge_router::i18n::normalize_locale_path;
use edge_router::Params;
use serde_json::Value;

use crate::{denormalize_page_path, normalize_page_path, ServerError, ServerResult};

/// What a page path resolved to.
#[derive(Clone)]
pub enum PageComponent {
    /// Compiled module.
    Module(ModuleRef),
    /// Pre-rendered HTML.
    StaticHtml(String),
    /// Placeholder used for serverless builds.
    Stub,
}

impl PageComponent {
    pub fn module(&self) -> Option<&ModuleRef> {
        match self {
            PageComponent::Module(module) => Some(module),
            _ => None,
        }
    }

    pub fn is_static_html(&self) -> bool {
        matches!(self, PageComponent::StaticHtml(_))
    }
}

impl std::fmt::Debug for PageComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageComponent::Module(_) => f.write_str("Module(..)"),
            PageComponent::StaticHtml(html) => {
                f.debug_tuple("StaticHtml").field(&html.len()).finish()
            }
            PageComponent::Stub => f.write_str("Stub"),
        }
    }
}

/// Everything the renderer needs for one page.
#[derive(Debug, Clone)]
pub struct LoadedComponents {
    pub page: String,
    pub document: PageComponent,
    pub app: PageComponent,
    pub component: PageComponent,
    pub build_manifest: Arc<BuildManifest>,
    pub loadable_manifest: Arc<Value>,
    pub server_component_manifest: Option<Arc<Value>>,
    /// Client entry of a server component page.
    pub client_entry: Option<ModuleRef>,
    pub page_config: PageConfig,
    pub exports: ModuleExports,
    /// The page lives in the app directory.
    pub is_app_path: bool,
}

/// Components plus the query they should be rendered with.
#[derive(Debug, Clone)]
pub struct FoundComponents {
    pub components: LoadedComponents,
    pub query: Query,
}

type Cached<T> = OnceLock<Result<Arc<T>, AssetError>>;

/// Resolves pages against the pages manifests and loads their components.
///
/// Manifests are parsed on first use and kept for the lifetime of the
/// loader.
#[derive(Debug)]
pub struct PageLoader {
    vfs: Arc<VirtualFs>,
    dist_path: String,
    server_path: String,
    app_dir: bool,
    server_components: bool,
    serverless: bool,
    pages_manifest: Cached<PagesManifest>,
    app_paths_manifest: Cached<PagesManifest>,
    build_manifest: Cached<BuildManifest>,
    loadable_manifest: Cached<Value>,
    server_component_manifest: Cached<Value>,
}

impl PageLoader {
    pub fn new(vfs: Arc<VirtualFs>, config: &ServerConfig) -> Self {
        let dist_path = config.dist_path();
        Self {
            vfs,
            server_path: join_paths(&dist_path, config.server_dir()),
            dist_path,
            app_dir: config.experimental.app_dir,
            server_components: config.experimental.server_components,
            serverless: config.target == Target::Serverless,
            pages_manifest: OnceLock::new(),
            app_paths_manifest: OnceLock::new(),
            build_manifest: OnceLock::new(),
            loadable_manifest: OnceLock::new(),
            server_component_manifest: OnceLock::new(),
        }
    }

    pub fn vfs(&self) -> &VirtualFs {
        &self.vfs
    }

    /// Server output directory (`<dist>/server` or `<dist>/serverless`).
    pub fn server_path(&self) -> &str {
        &self.server_path
    }

    fn cached<T: serde::de::DeserializeOwned>(
        &self,
        cell: &Cached<T>,
        path: &str,
    ) -> Result<Arc<T>, AssetError> {
        cell.get_or_init(|| self.vfs.read_manifest::<T>(path).map(Arc::new))
            .clone()
    }

    pub fn pages_manifest(&self) -> ServerResult<Arc<PagesManifest>> {
        let path = join_paths(&self.server_path, paths::PAGES_MANIFEST);
        Ok(self.cached(&self.pages_manifest, &path)?)
    }

    /// The app paths manifest, when the app directory is enabled and the
    /// build produced one.
    pub fn app_paths_manifest(&self) -> ServerResult<Option<Arc<PagesManifest>>> {
        if !self.app_dir {
            return Ok(None);
        }
        let path = join_paths(&self.server_path, paths::APP_PATHS_MANIFEST);
        match self.cached(&self.app_paths_manifest, &path) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a page to the path of its compiled file.
    ///
    /// With `locales`, a page missing from a manifest is retried against
    /// the manifest keys with their locale prefix removed.
    pub fn get_page_path(&self, page: &str, locales: &[String]) -> ServerResult<String> {
        let page = denormalize_page_path(&normalize_page_path(page)?);

        let check = |manifest: &PagesManifest| -> Option<String> {
            if let Some(file) = manifest.get(&page) {
                return Some(file.clone());
            }
            if locales.is_empty() {
                return None;
            }
            manifest
                .iter()
                .find(|(key, _)| normalize_locale_path(key, locales).pathname == page)
                .map(|(_, file)| file.clone())
        };

        let mut file = None;
        if let Some(manifest) = self.app_paths_manifest()? {
            file = check(&manifest);
        }
        if file.is_none() {
            file = check(&*self.pages_manifest()?);
        }

        match file {
            Some(file) => Ok(join_paths(&self.server_path, &file)),
            None => Err(ServerError::PageNotFound(page)),
        }
    }

    /// Whether `page` resolves in a manifest.
    pub fn has_page(&self, page: &str, locales: &[String]) -> ServerResult<bool> {
        match self.get_page_path(page, locales) {
            Ok(_) => Ok(true),
            Err(ServerError::PageNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Load the pre-rendered HTML or the module of a page.
    pub fn require_page(&self, page: &str) -> ServerResult<PageComponent> {
        let path = self.get_page_path(page, &[])?;
        if path.ends_with(".html") {
            return self
                .vfs
                .read_file_as_string(&path)
                .map(|html| PageComponent::StaticHtml(html.into_owned()))
                .map_err(|e| ServerError::MissingStaticPage {
                    page: page.to_string(),
                    message: e.to_string(),
                });
        }
        Ok(PageComponent::Module(self.vfs.read_module(&path)?))
    }

    /// Load the document, app wrapper and page module of `page` together
    /// with the manifests the renderer needs.
    pub fn load_components(&self, page: &str) -> ServerResult<LoadedComponents> {
        if self.serverless {
            return Ok(LoadedComponents {
                page: page.to_string(),
                document: PageComponent::Stub,
                app: PageComponent::Stub,
                component: PageComponent::Stub,
                build_manifest: Arc::default(),
                loadable_manifest: Arc::new(Value::Object(Default::default())),
                server_component_manifest: None,
                client_entry: None,
                page_config: PageConfig::default(),
                exports: ModuleExports::default(),
                is_app_path: false,
            });
        }

        let document = self.require_page("/_document")?;
        let app = self.require_page("/_app")?;
        let component = self.require_page(page)?;

        let build_manifest = self.cached(
            &self.build_manifest,
            &join_paths(&self.dist_path, paths::BUILD_MANIFEST),
        )?;
        let loadable_manifest = self.cached(
            &self.loadable_manifest,
            &join_paths(&self.dist_path, paths::REACT_LOADABLE_MANIFEST),
        )?;

        let mut server_component_manifest = None;
        let mut client_entry = None;
        if self.server_components {
            server_component_manifest = Some(self.cached(
                &self.server_component_manifest,
                &join_paths(&self.server_path, paths::FLIGHT_MANIFEST),
            )?);
            // Only server component pages have a client entry.
            client_entry = normalize_page_path(page)
                .and_then(|p| self.require_page(&format!("{p}{}", paths::CLIENT_SSR_ENTRY_SUFFIX)))
                .ok()
                .and_then(|c| c.module().cloned());
        }

        let (page_config, exports) = match component.module() {
            Some(module) => (module.config(), module.exports()),
            None => (PageConfig::default(), ModuleExports::default()),
        };

        let is_app_path = self.app_dir
            && self
                .get_page_path(page, &[])?
                .strip_prefix(&self.server_path)
                .is_some_and(|rest| rest.starts_with("/app/"));

        Ok(LoadedComponents {
            page: page.to_string(),
            document,
            app,
            component,
            build_manifest,
            loadable_manifest,
            server_component_manifest,
            client_entry,
            page_config,
            exports,
            is_app_path,
        })
    }

    /// Find the components to render `pathname` with.
    ///
    /// Candidates are the AMP variant (when `amp` is requested) and then
    /// the pathname itself. With a locale in the query every candidate is
    /// first tried under `/<locale>`. Missing pages move on to the next
    /// candidate; `None` means nothing matched.
    pub fn find_page_components(
        &self,
        pathname: &str,
        query: &Query,
        params: Option<&Params>,
        is_app_path: bool,
    ) -> ServerResult<Option<FoundComponents>> {
        let mut candidates = Vec::new();
        if query.get(AMP).is_some_and(|v| !v.is_empty()) {
            if let Ok(normalized) = normalize_page_path(pathname) {
                candidates.push(format!("{normalized}.amp"));
            }
        }
        candidates.push(pathname.to_string());

        let locale = query.get(NEXT_LOCALE).filter(|l| !l.is_empty());
        if let Some(locale) = locale {
            let prefixed = candidates.iter().map(|path| {
                if path == "/" {
                    format!("/{locale}")
                } else {
                    format!("/{locale}{path}")
                }
            });
            candidates = prefixed.chain(candidates.iter().cloned()).collect();
        }

        for candidate in &candidates {
            let components = match self.load_components(candidate) {
                Ok(components) => components,
                Err(ServerError::PageNotFound(_)) => continue,
                Err(e) => return Err(e),
            };

            // Static HTML is emitted per locale, so it must be found under
            // the locale prefix.
            if let Some(locale) = locale {
                if components.component.is_static_html()
                    && !candidate.starts_with(&format!("/{locale}"))
                {
                    continue;
                }
            }

            let mut page_query = if components.exports.get_static_props {
                [AMP, NEXT_DATA_REQ, NEXT_LOCALE, NEXT_DEFAULT_LOCALE]
                    .into_iter()
                    .filter_map(|key| query.get(key).map(|v| (key.to_string(), v.to_string())))
                    .collect()
            } else {
                query.clone()
            };
            if !is_app_path {
                if let Some(params) = params {
                    for (name, value) in params {
                        page_query.remove(name);
                        for v in value.values() {
                            page_query.append(name.clone(), v);
                        }
                    }
                }
            }

            tracing::debug!(pathname, page = %candidate, "page components found");
            return Ok(Some(FoundComponents {
                components,
                query: page_query,
            }));
        }

        Ok(None)
    }
}
