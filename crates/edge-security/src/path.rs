//! Path-traversal defence for static file serving.

use std::collections::HashSet;

use edge_assets::VirtualFs;
use percent_encoding::percent_decode_str;

/// Strict percent-decoding: every `%` must start a valid escape and the
/// result must be UTF-8. Returns `None` otherwise.
pub fn decode_uri_component(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .map(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .unwrap_or(false);
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// The enumerated set of files that may be served from disk-like locations
/// (public folder, user `static/`, build `static/`), as store keys.
#[derive(Debug, Clone, Default)]
pub struct ServeablePaths {
    keys: HashSet<String>,
}

impl ServeablePaths {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether an untrusted file path may be served.
    ///
    /// The path is decoded, `.`/`..` segments are resolved, and the result
    /// is made relative to the build root. Only members of the enumerated
    /// set pass; anything else, including undecodable input, is rejected.
    pub fn is_serveable_url(&self, vfs: &VirtualFs, untrusted: &str) -> bool {
        let Some(decoded) = decode_uri_component(untrusted) else {
            return false;
        };
        let absolute = if decoded.starts_with('/') {
            decoded
        } else {
            format!("/{decoded}")
        };
        self.keys.contains(&vfs.key_for(&absolute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_assets::AssetStore;

    fn fixture(dir: &str) -> (VirtualFs, ServeablePaths) {
        let store = AssetStore::builder()
            .text("/.next/static/chunks/main.js", "js", "application/javascript")
            .text("/public/robots.txt", "ok", "text/plain")
            .text("/public/file name.txt", "ok", "text/plain")
            .text("/secret", "nope", "text/plain")
            .build();
        let vfs = VirtualFs::new(store, dir);
        let paths = ServeablePaths::new(
            vfs.list_directory("/.next/static")
                .into_iter()
                .chain(vfs.list_directory("/public")),
        );
        (vfs, paths)
    }

    #[test]
    fn test_decode_uri_component() {
        assert_eq!(decode_uri_component("a%20b").as_deref(), Some("a b"));
        assert_eq!(decode_uri_component("%2e%2e").as_deref(), Some(".."));
        assert_eq!(decode_uri_component("100%"), None);
        assert_eq!(decode_uri_component("%zz"), None);
        assert_eq!(decode_uri_component("%ff"), None);
    }

    #[test]
    fn test_enumerated_files_are_serveable() {
        let (vfs, paths) = fixture("/");
        assert!(paths.is_serveable_url(&vfs, "/.next/static/chunks/main.js"));
        assert!(paths.is_serveable_url(&vfs, "/public/robots.txt"));
        assert!(paths.is_serveable_url(&vfs, "/public/file%20name.txt"));
        assert!(paths.is_serveable_url(&vfs, "/public/../public/robots.txt"));
    }

    #[test]
    fn test_traversal_rejected() {
        let (vfs, paths) = fixture("/");
        assert!(!paths.is_serveable_url(&vfs, "/.next/static/../../secret"));
        assert!(!paths.is_serveable_url(&vfs, "/.next/static/%2e%2e/%2e%2e/secret"));
        assert!(!paths.is_serveable_url(&vfs, "/.next/static/%2E%2E%2F%2E%2E%2Fsecret"));
        assert!(!paths.is_serveable_url(&vfs, "/public/%zz"));
    }

    #[test]
    fn test_nested_root() {
        let store = AssetStore::builder()
            .text("/public/a.txt", "a", "text/plain")
            .build();
        let vfs = VirtualFs::new(store, "/srv/app");
        let paths = ServeablePaths::new(vfs.list_directory("/srv/app/public"));
        assert!(paths.is_serveable_url(&vfs, "/srv/app/public/a.txt"));
        assert!(!paths.is_serveable_url(&vfs, "/srv/app/public/../../app/public/b.txt"));
        assert!(!paths.is_serveable_url(&vfs, "/public/a.txt"));
    }

    #[test]
    fn test_empty_set_rejects_everything() {
        let (vfs, _) = fixture("/");
        assert!(!ServeablePaths::default().is_serveable_url(&vfs, "/public/robots.txt"));
    }
}
