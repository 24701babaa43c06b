//! `Cache-Control` policies for rendered payloads and build assets.

use serde::{Deserialize, Serialize};

/// One year, the horizon used for "never revalidate".
pub const CACHE_ONE_YEAR: u64 = 31_536_000;

/// Cache header for fingerprinted build assets.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Cache header for private or stateful payloads.
pub const PRIVATE_CACHE_CONTROL: &str = "private, no-cache, no-store, max-age=0, must-revalidate";

/// Policy errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CachePolicyError {
    #[error("Invalid revalidate value {0}, must be a positive number of seconds")]
    InvalidRevalidate(u64),
}

/// When a pre-rendered payload should be regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Revalidate {
    /// After this many seconds.
    Seconds(u64),
    /// Never; cached for a year.
    Never,
}

/// Cache behaviour of one rendered payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadCachePolicy {
    /// Response is user-specific.
    pub private: bool,
    /// Response depends on request state (e.g. server-side props).
    pub stateful: bool,
    pub revalidate: Option<Revalidate>,
}

impl PayloadCachePolicy {
    /// No cache directives.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn private() -> Self {
        Self {
            private: true,
            ..Default::default()
        }
    }

    pub fn stateful() -> Self {
        Self {
            stateful: true,
            ..Default::default()
        }
    }

    /// Regenerate after `seconds`.
    pub fn revalidate(seconds: u64) -> Self {
        Self {
            revalidate: Some(Revalidate::Seconds(seconds)),
            ..Default::default()
        }
    }

    /// Never regenerate.
    pub fn never() -> Self {
        Self {
            revalidate: Some(Revalidate::Never),
            ..Default::default()
        }
    }

    /// `Cache-Control` value to set, given the value already staged on the
    /// response. `Ok(None)` leaves the response untouched.
    ///
    /// Stateful payloads keep an explicitly staged header; private payloads
    /// always override it.
    pub fn cache_control(
        &self,
        existing: Option<&str>,
    ) -> Result<Option<String>, CachePolicyError> {
        if self.private || self.stateful {
            if self.private || existing.is_none() {
                return Ok(Some(PRIVATE_CACHE_CONTROL.to_string()));
            }
            return Ok(None);
        }
        match self.revalidate {
            Some(Revalidate::Seconds(0)) => Err(CachePolicyError::InvalidRevalidate(0)),
            Some(Revalidate::Seconds(s)) => {
                Ok(Some(format!("s-maxage={s}, stale-while-revalidate")))
            }
            Some(Revalidate::Never) => Ok(Some(format!(
                "s-maxage={CACHE_ONE_YEAR}, stale-while-revalidate"
            ))),
            None => Ok(None),
        }
    }
}

/// Whether a `/_next/static/<path>` asset is fingerprinted and may be cached
/// forever.
pub fn is_immutable_static_path(segments: &[&str], build_id: &str) -> bool {
    let first = segments.first().copied();
    matches!(
        first,
        Some("runtime")
            | Some("chunks")
            | Some("css")
            | Some("image")
            | Some("media")
            | Some("pages")
    ) || first == Some(build_id)
        || segments.get(1).copied() == Some("pages")
}
