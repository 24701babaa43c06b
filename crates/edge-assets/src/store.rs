//! Immutable asset store.

use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;

use crate::{guess_content_type, normalize_posix, Asset};

/// Collects assets at startup.
#[derive(Debug, Default)]
pub struct AssetStoreBuilder {
    assets: IndexMap<String, Asset>,
}

impl AssetStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset under a path relative to the build root
    /// (e.g. `/.next/BUILD_ID`). Later inserts replace earlier ones but keep
    /// the original position.
    pub fn insert(mut self, path: &str, asset: Asset) -> Self {
        self.assets.insert(normalize_posix(path), asset);
        self
    }

    pub fn text(self, path: &str, content: impl Into<String>, content_type: &str) -> Self {
        self.insert(path, Asset::text(content, content_type))
    }

    /// Add a static file typed by its extension.
    pub fn file(self, path: &str, content: impl Into<Bytes>) -> Self {
        let content_type = guess_content_type(path);
        self.insert(path, Asset::bytes(content, content_type))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn build(self) -> AssetStore {
        tracing::debug!(assets = self.assets.len(), "asset store built");
        AssetStore {
            assets: Arc::new(self.assets),
        }
    }
}

/// Insertion-ordered map of virtual path to asset. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    assets: Arc<IndexMap<String, Asset>>,
}

impl AssetStore {
    pub fn builder() -> AssetStoreBuilder {
        AssetStoreBuilder::new()
    }

    /// Look up by key (already normalized, leading `/`).
    pub fn get(&self, key: &str) -> Option<&Asset> {
        self.assets.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.assets.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    /// Keys under `prefix`, which must end with `/`.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.keys().filter(move |k| k.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
