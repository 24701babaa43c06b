//! Deadline around the upstream round trip.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use edge_security::ProxyLimits;
use futures::future::{self, BoxFuture, Either};

/// Timeout configuration for a proxied fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Total operation timeout.
    pub total: Duration,
}

impl TimeoutConfig {
    pub fn from_total(total: Duration) -> Self {
        Self { total }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            total: Duration::from_secs(30),
        }
    }
}

impl From<&ProxyLimits> for TimeoutConfig {
    fn from(limits: &ProxyLimits) -> Self {
        Self::from_total(limits.timeout)
    }
}

/// Error when a timeout is exceeded.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("Total timeout after {0:?}")]
    Total(Duration),
}

/// Source of sleep futures used to race an operation against its deadline.
pub trait Timer: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Timer backed by the tokio time driver.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[cfg(not(target_arch = "wasm32"))]
impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Timer that never fires. The host's own request deadline bounds the
/// fetch instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDeadline;

impl Timer for HostDeadline {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(future::pending())
    }
}

/// Timer for the current target.
pub fn default_timer() -> Arc<dyn Timer> {
    #[cfg(target_arch = "wasm32")]
    {
        Arc::new(HostDeadline)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Arc::new(TokioTimer)
    }
}

/// Run `fut`, failing with [`TimeoutError::Total`] once `config.total` has
/// elapsed. The losing future is dropped.
pub async fn with_timeout<F>(
    timer: &dyn Timer,
    config: TimeoutConfig,
    fut: F,
) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    let sleep = timer.sleep(config.total);
    futures::pin_mut!(fut);
    match future::select(fut, sleep).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(TimeoutError::Total(config.total)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_proxy_limits() {
        assert_eq!(
            TimeoutConfig::from(&ProxyLimits::default()),
            TimeoutConfig::default()
        );
    }

    #[tokio::test]
    async fn test_completes_before_deadline() {
        let config = TimeoutConfig::from_total(Duration::from_secs(5));
        let result = with_timeout(&TokioTimer, config, async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let config = TimeoutConfig::from_total(Duration::from_millis(10));
        let result = with_timeout(&TokioTimer, config, future::pending::<()>()).await;
        assert_eq!(result, Err(TimeoutError::Total(Duration::from_millis(10))));
    }

    #[tokio::test]
    async fn test_host_deadline_never_fires() {
        let config = TimeoutConfig::from_total(Duration::ZERO);
        let result = with_timeout(&HostDeadline, config, async { "done" }).await;
        assert_eq!(result, Ok("done"));
    }
}
