//! Contract for pre-loaded compiled page and API modules.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Query, RequestAdapter, ResponseAdapter};

/// Errors raised by a page module.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Module does not export an API handler")]
    NotAnApiRoute,
    #[error("Module handler failed: {0}")]
    Handler(String),
}

/// Which data-fetching hooks a page module exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleExports {
    pub get_static_props: bool,
    pub get_server_side_props: bool,
    pub get_static_paths: bool,
}

/// AMP mode declared by a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmpMode {
    #[default]
    Off,
    Hybrid,
    Only,
}

/// Page-level `config` export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    #[serde(default)]
    pub amp: AmpMode,
    /// API routes only: parse the body before invoking the handler.
    #[serde(default = "default_true")]
    pub body_parser: bool,
}

fn default_true() -> bool {
    true
}

/// A compiled module shipped inside the asset bundle.
///
/// The asset layer treats modules as opaque; the loader, the API route
/// handler and the renderer are the only consumers. Handlers run on the
/// single request task, so their futures need not be `Send`.
#[async_trait(?Send)]
pub trait PageModule: Send + Sync {
    /// Data-fetching exports.
    fn exports(&self) -> ModuleExports {
        ModuleExports::default()
    }

    fn config(&self) -> PageConfig {
        PageConfig {
            body_parser: true,
            ..Default::default()
        }
    }

    /// Whether the module default-exports an API handler.
    fn is_api_handler(&self) -> bool {
        false
    }

    /// Handle an API request. The handler must send the response.
    async fn handle_api(
        &self,
        _req: &RequestAdapter,
        _res: &ResponseAdapter,
        _query: &Query,
    ) -> Result<(), ModuleError> {
        Err(ModuleError::NotAnApiRoute)
    }
}

/// Shared handle to a loaded module.
pub type ModuleRef = Arc<dyn PageModule>;

impl std::fmt::Debug for dyn PageModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PageModule(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;
    impl PageModule for Blank {}

    #[tokio::test]
    async fn test_default_module_is_not_api() {
        let module: ModuleRef = Arc::new(Blank);
        let req = RequestAdapter::from_platform(
            http::Request::get("/api/x").body(bytes::Bytes::new()).unwrap(),
            Default::default(),
        );
        let (res, _pending) = ResponseAdapter::new();
        assert!(!module.is_api_handler());
        assert_eq!(
            module.handle_api(&req, &res, &Query::new()).await,
            Err(ModuleError::NotAnApiRoute)
        );
        assert!(module.config().body_parser);
    }

    #[test]
    fn test_page_config_deserializes() {
        let config: PageConfig = serde_json::from_str(r#"{"amp":"hybrid"}"#).unwrap();
        assert_eq!(config.amp, AmpMode::Hybrid);
        assert!(config.body_parser);
    }
}
