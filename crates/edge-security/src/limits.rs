//! Bounds applied to proxied requests.

use std::time::Duration;

use edge_core::ProxyConfig;
use serde::{Deserialize, Serialize};

/// Limit violations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LimitError {
    #[error("request body of {size} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { size: usize, limit: usize },
}

/// Limits for one proxied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLimits {
    /// Maximum request body forwarded upstream.
    pub max_body_bytes: usize,
    /// Upper bound on the upstream round trip.
    pub timeout: Duration,
}

impl Default for ProxyLimits {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10 MB
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ProxyConfig> for ProxyLimits {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

impl ProxyLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum request body size in bytes.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check a request body length against the limit.
    pub fn check_body(&self, size: usize) -> Result<(), LimitError> {
        if size > self.max_body_bytes {
            return Err(LimitError::BodyTooLarge {
                size,
                limit: self.max_body_bytes,
            });
        }
        Ok(())
    }
}
