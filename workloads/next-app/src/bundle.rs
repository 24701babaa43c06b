//! The pre-built site shipped with the component.

use std::sync::Arc;

use edge_assets::{Asset, AssetStore};
use edge_core::PageModule;

/// Build id of the bundled site.
pub const BUILD_ID: &str = "demo-build";

/// Page module with no data hooks; the shell renderer draws it.
struct ShellPage;

impl PageModule for ShellPage {}

fn module() -> Asset {
    Asset::module(Arc::new(ShellPage))
}

const PAGES_MANIFEST: &str = r#"{
    "/_document": "pages/_document.js",
    "/_app": "pages/_app.js",
    "/_error": "pages/_error.js",
    "/": "pages/index.js",
    "/en/about": "pages/en/about.html",
    "/fr/about": "pages/fr/about.html",
    "/products/[id]": "pages/products/[id].js"
}"#;

const ROUTES_MANIFEST: &str = r#"{
    "version": 3,
    "basePath": "",
    "headers": [],
    "redirects": [
        {"source": "/shop/:id", "destination": "/products/:id", "permanent": true}
    ],
    "rewrites": [
        {"source": "/api/catalog/:path*", "destination": "https://catalog.example.com/v1/:path*"}
    ],
    "dynamicRoutes": []
}"#;

/// Every file of the site, keyed by its path in the build root.
pub fn assets() -> AssetStore {
    AssetStore::builder()
        .text("/.next/BUILD_ID", BUILD_ID, "text/plain")
        .text("/.next/build-manifest.json", r#"{"pages":{}}"#, "application/json")
        .text("/.next/react-loadable-manifest.json", "{}", "application/json")
        .text("/.next/routes-manifest.json", ROUTES_MANIFEST, "application/json")
        .text("/.next/server/pages-manifest.json", PAGES_MANIFEST, "application/json")
        .insert("/.next/server/pages/_document.js", module())
        .insert("/.next/server/pages/_app.js", module())
        .insert("/.next/server/pages/_error.js", module())
        .insert("/.next/server/pages/index.js", module())
        .insert("/.next/server/pages/products/[id].js", module())
        .text(
            "/.next/server/pages/en/about.html",
            "<!DOCTYPE html><html><body><h1>About us</h1></body></html>",
            "text/html; charset=utf-8",
        )
        .text(
            "/.next/server/pages/fr/about.html",
            "<!DOCTYPE html><html><body><h1>À propos</h1></body></html>",
            "text/html; charset=utf-8",
        )
        .text(
            "/.next/static/chunks/main.js",
            "console.log(\"hydrate\");",
            "application/javascript",
        )
        .file("/public/robots.txt", "User-agent: *\nAllow: /\n")
        .build()
}
