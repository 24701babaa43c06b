//! Ordered lifecycle hooks.
//!
//! Hooks are registered per phase with a priority and frozen by
//! [`LifecycleBuilder::build`]. Lower priorities run first; hooks with equal
//! priority run in registration order.

use std::sync::Arc;
use std::time::Duration;

use crate::RequestId;

/// Lifecycle phases for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// Request received from the platform, before routing.
    FetchEvent,
    /// Response materialized and about to be returned.
    Completion,
    /// An error escaped the router.
    Error,
}

/// Data passed to every hook.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub phase: LifecyclePhase,
    pub request_id: RequestId,
    pub method: String,
    pub url: String,
    /// Response status, once known.
    pub status: Option<u16>,
    /// Error message for [`LifecyclePhase::Error`].
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl LifecycleEvent {
    pub fn new(phase: LifecyclePhase, request_id: RequestId, method: &str, url: &str) -> Self {
        Self {
            phase,
            request_id,
            method: method.to_string(),
            url: url.to_string(),
            status: None,
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

/// Hook callback.
pub type Hook = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

struct Registration {
    phase: LifecyclePhase,
    priority: i32,
    hook: Hook,
}

/// Collects hooks before they are frozen.
#[derive(Default)]
pub struct LifecycleBuilder {
    registrations: Vec<Registration>,
}

impl LifecycleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for `phase`.
    pub fn on<F>(mut self, phase: LifecyclePhase, priority: i32, hook: F) -> Self
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.registrations.push(Registration {
            phase,
            priority,
            hook: Arc::new(hook),
        });
        self
    }

    /// Freeze the registrations into per-phase ordered lists.
    pub fn build(mut self) -> Lifecycle {
        // Stable sort keeps registration order among equal priorities.
        self.registrations.sort_by_key(|r| r.priority);
        let mut lifecycle = Lifecycle::default();
        for r in self.registrations {
            match r.phase {
                LifecyclePhase::FetchEvent => lifecycle.fetch_event.push(r.hook),
                LifecyclePhase::Completion => lifecycle.completion.push(r.hook),
                LifecyclePhase::Error => lifecycle.error.push(r.hook),
            }
        }
        lifecycle
    }
}

/// Frozen hook lists.
#[derive(Clone, Default)]
pub struct Lifecycle {
    fetch_event: Vec<Hook>,
    completion: Vec<Hook>,
    error: Vec<Hook>,
}

impl Lifecycle {
    pub fn builder() -> LifecycleBuilder {
        LifecycleBuilder::new()
    }

    /// Run every hook registered for the event's phase, in order.
    pub fn run(&self, event: &LifecycleEvent) {
        let hooks = match event.phase {
            LifecyclePhase::FetchEvent => &self.fetch_event,
            LifecyclePhase::Completion => &self.completion,
            LifecyclePhase::Error => &self.error,
        };
        for hook in hooks {
            hook(event);
        }
    }

    pub fn hook_count(&self, phase: LifecyclePhase) -> usize {
        match phase {
            LifecyclePhase::FetchEvent => self.fetch_event.len(),
            LifecyclePhase::Completion => self.completion.len(),
            LifecyclePhase::Error => self.error.len(),
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("fetch_event", &self.fetch_event.len())
            .field("completion", &self.completion.len())
            .field("error", &self.error.len())
            .finish()
    }
}
