//! Asset lookup errors.

/// Errors raised by the asset store and virtual filesystem.
///
/// `NotFound` is the only recoverable case; callers use it to try the next
/// candidate or fall back to a 404.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),
    #[error("Asset is not a module: {0}")]
    NotAModule(String),
    #[error("Asset is not valid UTF-8: {0}")]
    InvalidUtf8(String),
    #[error("Malformed manifest {path}: {message}")]
    MalformedManifest { path: String, message: String },
}

impl AssetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound(_))
    }
}
