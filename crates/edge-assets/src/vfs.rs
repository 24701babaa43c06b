//! Filesystem-style accessors over the asset store.
//!
//! Every accessor takes a logical path, either absolute under the build
//! root or relative to it, and maps it to a store key with
//! [`VirtualFs::key_for`]. Build-time keys go through the same
//! normalization, so lookups and registrations always agree.

use std::borrow::Cow;

use edge_core::ModuleRef;
use serde::de::DeserializeOwned;

use crate::{Asset, AssetContent, AssetError, AssetStore};

/// Collapse `.`, `..` and repeated separators. The result always starts
/// with `/`; `..` never climbs above the root.
pub fn normalize_posix(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Relative path from `from` to `to`, both normalized absolute paths.
fn relative(from: &str, to: &str) -> String {
    let from: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend_from_slice(&to[common..]);
    parts.join("/")
}

/// Read-only filesystem view rooted at the build directory.
#[derive(Debug, Clone)]
pub struct VirtualFs {
    store: AssetStore,
    dir: String,
}

impl VirtualFs {
    pub fn new(store: AssetStore, dir: &str) -> Self {
        Self {
            store,
            dir: normalize_posix(dir),
        }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Store key for a logical path: `"/" + relative(dir, path)`.
    pub fn key_for(&self, path: &str) -> String {
        let absolute = if path.starts_with('/') {
            normalize_posix(path)
        } else {
            normalize_posix(&format!("{}/{}", self.dir, path))
        };
        format!("/{}", relative(&self.dir, &absolute))
    }

    pub fn asset(&self, path: &str) -> Result<&Asset, AssetError> {
        let key = self.key_for(path);
        self.store.get(&key).ok_or(AssetError::NotFound(key))
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.store.contains(&self.key_for(path))
    }

    pub fn read_file(&self, path: &str) -> Result<&AssetContent, AssetError> {
        self.asset(path).map(|a| &a.content)
    }

    pub fn read_file_as_string(&self, path: &str) -> Result<Cow<'_, str>, AssetError> {
        match self.read_file(path)? {
            AssetContent::Text(s) => Ok(Cow::Borrowed(s)),
            AssetContent::Bytes(b) => std::str::from_utf8(b)
                .map(Cow::Borrowed)
                .map_err(|_| AssetError::InvalidUtf8(self.key_for(path))),
        }
    }

    pub fn content_type(&self, path: &str) -> Result<&str, AssetError> {
        self.asset(path).map(|a| a.content_type.as_str())
    }

    pub fn read_module(&self, path: &str) -> Result<ModuleRef, AssetError> {
        let asset = self.asset(path)?;
        asset
            .module
            .clone()
            .ok_or_else(|| AssetError::NotAModule(self.key_for(path)))
    }

    /// Parse a JSON manifest.
    pub fn read_manifest<T: DeserializeOwned>(&self, path: &str) -> Result<T, AssetError> {
        let text = self.read_file_as_string(path)?;
        serde_json::from_str(&text).map_err(|e| AssetError::MalformedManifest {
            path: self.key_for(path),
            message: e.to_string(),
        })
    }

    fn directory_prefix(&self, path: &str) -> String {
        let key = self.key_for(path);
        if key == "/" {
            key
        } else {
            format!("{key}/")
        }
    }

    /// A directory exists when at least one key lives under it.
    pub fn directory_exists(&self, path: &str) -> bool {
        let prefix = self.directory_prefix(path);
        let found = self.store.keys_with_prefix(&prefix).next().is_some();
        found
    }

    /// Every key under the directory, recursively, in insertion order.
    pub fn list_directory(&self, path: &str) -> Vec<String> {
        let prefix = self.directory_prefix(path);
        self.store
            .keys_with_prefix(&prefix)
            .map(str::to_string)
            .collect()
    }
}
