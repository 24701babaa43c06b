//! API route dispatch.

use edge_core::{Query, RequestAdapter, ResponseAdapter, NEXT_DEFAULT_LOCALE, NEXT_LOCALE};
use edge_observability::StructuredLogger;
use edge_router::{is_dynamic_route, DynamicRoute, Params};

use crate::{PageLoader, ServerError, ServerResult};

/// Run the API route for `pathname`, if there is one.
///
/// A static page is tried first, then the first dynamic route under
/// `/api` that matches. Returns `false` when no API route applies.
pub async fn handle_api_request(
    loader: &PageLoader,
    dynamic_routes: &[DynamicRoute],
    logger: &StructuredLogger,
    req: &RequestAdapter,
    res: &ResponseAdapter,
    pathname: &str,
    query: &Query,
) -> ServerResult<bool> {
    let mut page = pathname.to_string();
    let mut params = None;
    let mut found = !is_dynamic_route(pathname) && loader.has_page(pathname, &[])?;

    if !found {
        if let Some((route, matched)) = dynamic_routes
            .iter()
            .filter(|route| route.page().starts_with("/api"))
            .find_map(|route| route.matches(pathname).map(|params| (route, params)))
        {
            page = route.page().to_string();
            params = Some(matched);
            found = true;
        }
    }
    if !found {
        return Ok(false);
    }

    let built_path = match loader.get_page_path(&page, &[]) {
        Ok(path) => path,
        Err(ServerError::PageNotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    };

    run_api(loader, logger, req, res, query, params.as_ref(), &page, &built_path).await?;
    Ok(true)
}

/// Invoke the API module at `built_path`.
///
/// Route params are merged into the query and the locale keys removed.
#[allow(clippy::too_many_arguments)]
pub async fn run_api(
    loader: &PageLoader,
    logger: &StructuredLogger,
    req: &RequestAdapter,
    res: &ResponseAdapter,
    query: &Query,
    params: Option<&Params>,
    page: &str,
    built_path: &str,
) -> ServerResult<()> {
    let module = loader.vfs().read_module(built_path)?;

    let mut query = query.clone();
    if let Some(params) = params {
        for (name, value) in params {
            query.remove(name);
            for v in value.values() {
                query.append(name.clone(), v);
            }
        }
    }
    query.remove(NEXT_LOCALE);
    query.remove(NEXT_DEFAULT_LOCALE);

    logger.debug_builder("api route").field("page", page).emit();
    module.handle_api(req, res, &query).await?;

    if !res.is_sent() {
        logger
            .warn_builder("API handler returned without sending a response")
            .field("page", page)
            .emit();
        res.send();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use edge_assets::{Asset, AssetStore, VirtualFs};
    use edge_core::{
        BodyWriter, ClientInfo, ModuleError, PageModule, ResponseBody, ServerConfig, StatusHolder,
    };
    use edge_observability::MemorySink;

    /// Echoes the query it was called with.
    struct Echo {
        send: bool,
    }

    #[async_trait(?Send)]
    impl PageModule for Echo {
        fn is_api_handler(&self) -> bool {
            true
        }

        async fn handle_api(
            &self,
            _req: &RequestAdapter,
            res: &ResponseAdapter,
            query: &Query,
        ) -> Result<(), ModuleError> {
            res.set_status(200).map_err(|e| ModuleError::Handler(e.to_string()))?;
            res.body(query.to_query_string())
                .map_err(|e| ModuleError::Handler(e.to_string()))?;
            if self.send {
                res.send();
            }
            Ok(())
        }
    }

    fn loader() -> PageLoader {
        let store = AssetStore::builder()
            .text(
                "/.next/server/pages-manifest.json",
                r#"{"/api/hello": "pages/api/hello.js", "/api/users/[id]": "pages/api/users/[id].js", "/api/lazy": "pages/api/lazy.js"}"#,
                "application/json",
            )
            .insert("/.next/server/pages/api/hello.js", Asset::module(Arc::new(Echo { send: true })))
            .insert(
                "/.next/server/pages/api/users/[id].js",
                Asset::module(Arc::new(Echo { send: true })),
            )
            .insert("/.next/server/pages/api/lazy.js", Asset::module(Arc::new(Echo { send: false })))
            .build();
        PageLoader::new(Arc::new(VirtualFs::new(store, "/")), &ServerConfig::default())
    }

    fn routes() -> Vec<DynamicRoute> {
        vec![DynamicRoute::new("/api/users/[id]").unwrap()]
    }

    fn request() -> RequestAdapter {
        RequestAdapter::from_platform(
            http::Request::get("/api").body(Bytes::new()).unwrap(),
            ClientInfo::default(),
        )
    }

    async fn call(
        pathname: &str,
        query: Query,
        logger: &StructuredLogger,
    ) -> (bool, Option<http::Response<ResponseBody>>) {
        let req = request();
        let (res, pending) = ResponseAdapter::new();
        let handled = handle_api_request(&loader(), &routes(), logger, &req, &res, pathname, &query)
            .await
            .unwrap();
        let out = if res.is_sent() {
            Some(pending.materialize().await.unwrap().response)
        } else {
            None
        };
        (handled, out)
    }

    #[tokio::test]
    async fn test_static_api_route() {
        let mut query = Query::new();
        query.insert(NEXT_LOCALE, "fr");
        query.insert("a", "1");
        let (handled, out) = call("/api/hello", query, &StructuredLogger::new()).await;
        assert!(handled);
        let body = out.unwrap().into_body().collect().await.unwrap();
        assert_eq!(&body[..], b"a=1");
    }

    #[tokio::test]
    async fn test_dynamic_api_route_merges_params() {
        let (handled, out) = call("/api/users/42", Query::new(), &StructuredLogger::new()).await;
        assert!(handled);
        let body = out.unwrap().into_body().collect().await.unwrap();
        assert_eq!(&body[..], b"id=42");
    }

    #[tokio::test]
    async fn test_unknown_api_route() {
        let (handled, out) = call("/api/nope", Query::new(), &StructuredLogger::new()).await;
        assert!(!handled);
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_unsent_response_is_sent_with_warning() {
        let sink = MemorySink::new();
        let logger = StructuredLogger::new().with_sink(sink.clone());
        let (handled, out) = call("/api/lazy", Query::new(), &logger).await;
        assert!(handled);
        assert!(out.is_some());
        assert_eq!(sink.find("without sending").len(), 1);
    }
}
