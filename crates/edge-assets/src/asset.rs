//! Individual build assets.

use bytes::Bytes;
use edge_core::ModuleRef;

/// Raw content of an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetContent {
    Text(String),
    Bytes(Bytes),
}

impl AssetContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AssetContent::Text(s) => s.as_bytes(),
            AssetContent::Bytes(b) => b,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            AssetContent::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            AssetContent::Bytes(b) => b.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One file of the build output.
#[derive(Clone)]
pub struct Asset {
    pub content: AssetContent,
    pub content_type: String,
    /// Pre-loaded compiled module, when the file is executable code.
    pub module: Option<ModuleRef>,
    /// Static-only asset (no module).
    pub is_static: bool,
}

impl Asset {
    /// A static text asset.
    pub fn text(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            content: AssetContent::Text(content.into()),
            content_type: content_type.into(),
            module: None,
            is_static: true,
        }
    }

    /// A static binary asset.
    pub fn bytes(content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            content: AssetContent::Bytes(content.into()),
            content_type: content_type.into(),
            module: None,
            is_static: true,
        }
    }

    /// A compiled module. The source text is kept for completeness.
    pub fn module(module: ModuleRef) -> Self {
        Self {
            content: AssetContent::Text(String::new()),
            content_type: "application/javascript".to_string(),
            module: Some(module),
            is_static: false,
        }
    }
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asset")
            .field("len", &self.content.len())
            .field("content_type", &self.content_type)
            .field("module", &self.module.is_some())
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// MIME type guessed from the file extension, for assets registered
/// without an explicit type.
pub fn guess_content_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_bytes() {
        let text = AssetContent::Text("hi".into());
        let bin = AssetContent::Bytes(Bytes::from_static(&[0, 1, 2]));
        assert_eq!(text.as_bytes(), b"hi");
        assert_eq!(bin.len(), 3);
        assert!(!text.is_empty());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("/public/logo.SVG"), "image/svg+xml");
        assert_eq!(guess_content_type("/public/robots.txt"), "text/plain");
        assert_eq!(guess_content_type("/BUILD_ID"), "application/octet-stream");
        assert_eq!(guess_content_type("/dir.v2/file"), "application/octet-stream");
    }
}
