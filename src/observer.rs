//! Resolution listeners for diagnostics and tracing.
//!
//! Listeners are injected through [`ServiceCollection::add_listener`](crate::ServiceCollection::add_listener)
//! and notified at three points: when a call-site graph is built, when a
//! service is resolved and when a service's execution strategy is promoted.
//! Every hook has an empty default so implementors pick the events they need.

use std::sync::Arc;

use crate::call_site::CallSite;
use crate::key::Key;
use crate::resolver::ResolverStrategy;

/// Hook interface for resolution events.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Key, ResolutionListener, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct CountingListener {
///     resolved: AtomicUsize,
/// }
///
/// impl ResolutionListener for CountingListener {
///     fn on_resolved(&self, _key: &Key, _scope_id: u64) {
///         self.resolved.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let listener = Arc::new(CountingListener::default());
/// let mut services = ServiceCollection::new();
/// services.add_singleton(7u8);
/// services.add_listener(listener.clone());
///
/// let provider = services.build();
/// provider.get_required::<u8>();
/// provider.get_required::<u8>();
/// assert_eq!(listener.resolved.load(Ordering::Relaxed), 2);
/// ```
pub trait ResolutionListener: Send + Sync {
    /// A call-site graph for `key` was built and cached.
    fn on_call_site_built(&self, _key: &Key, _call_site: &CallSite) {}

    /// `key` was resolved in the scope identified by `scope_id` (0 is the root).
    fn on_resolved(&self, _key: &Key, _scope_id: u64) {}

    /// The accessor of `key` now executes with `strategy`.
    fn on_promoted(&self, _key: &Key, _strategy: ResolverStrategy) {}
}

/// Registered listeners, cheap to clone into the engine's parts.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    listeners: Arc<Vec<Arc<dyn ResolutionListener>>>,
}

impl Listeners {
    pub(crate) fn new(listeners: Vec<Arc<dyn ResolutionListener>>) -> Self {
        Self {
            listeners: Arc::new(listeners),
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn call_site_built(&self, key: &Key, call_site: &CallSite) {
        for listener in self.listeners.iter() {
            listener.on_call_site_built(key, call_site);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, scope_id: u64) {
        for listener in self.listeners.iter() {
            listener.on_resolved(key, scope_id);
        }
    }

    pub(crate) fn promoted(&self, key: &Key, strategy: ResolverStrategy) {
        for listener in self.listeners.iter() {
            listener.on_promoted(key, strategy);
        }
    }
}

/// Listener that forwards every event to `tracing`.
///
/// Built-call-site and promotion events are emitted at `debug`, resolutions at
/// `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl TracingListener {
    pub fn new() -> Self {
        Self
    }
}

impl ResolutionListener for TracingListener {
    fn on_call_site_built(&self, key: &Key, call_site: &CallSite) {
        tracing::debug!(
            service = key.display_name(),
            kind = ?call_site.kind(),
            nodes = call_site.node_count(),
            "call site built"
        );
    }

    fn on_resolved(&self, key: &Key, scope_id: u64) {
        tracing::trace!(service = key.display_name(), scope_id, "service resolved");
    }

    fn on_promoted(&self, key: &Key, strategy: ResolverStrategy) {
        tracing::debug!(service = key.display_name(), ?strategy, "accessor promoted");
    }
}
