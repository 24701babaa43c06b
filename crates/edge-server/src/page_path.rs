//! Page path normalization (`/` <-> `/index`).

use edge_assets::normalize_posix;
use edge_router::is_dynamic_route;

use crate::{ServerError, ServerResult};

/// Map a page to the form used for build artifacts: `/` becomes `/index`
/// and a real `/index/...` page is prefixed once more.
///
/// Pages whose normalized form differs from what was requested (e.g. they
/// contain `..`) are rejected as not found.
pub fn normalize_page_path(page: &str) -> ServerResult<String> {
    let normalized = if page == "/" {
        "/index".to_string()
    } else if page == "/index" || page.starts_with("/index/") {
        format!("/index{page}")
    } else if page.starts_with('/') {
        page.to_string()
    } else {
        format!("/{page}")
    };

    if normalize_posix(&normalized) != normalized {
        return Err(ServerError::PageNotFound(page.to_string()));
    }
    Ok(normalized)
}

/// Inverse of [`normalize_page_path`].
pub fn denormalize_page_path(page: &str) -> String {
    let page = page.replace('\\', "/");
    if page.starts_with("/index/") && !is_dynamic_route(&page) {
        page["/index".len()..].to_string()
    } else if page == "/index" {
        "/".to_string()
    } else {
        page
    }
}

/// Route of a build asset: `/blog.json` -> `/blog`, `/index.json` -> `/`,
/// `/index/index.json` -> `/index`.
pub fn get_route_from_asset_path(asset_path: &str, ext: &str) -> String {
    let path = asset_path.replace('\\', "/");
    let path = path.strip_suffix(ext).unwrap_or(&path);
    if path.starts_with("/index/") && !is_dynamic_route(path) {
        path["/index".len()..].to_string()
    } else if path == "/index" {
        "/".to_string()
    } else {
        path.to_string()
    }
}
