//! Execution strategies and the per-service accessor.
//!
//! Every service gets one [`ServiceAccessor`] holding its call-site graph and
//! the backend currently executing it. Backends are interchangeable and must
//! behave identically; they trade build cost against per-call cost:
//!
//! - **Interpreted**: walks the graph on every call. No build cost.
//! - **Compiled**: the graph lowered once into nested closures.
//! - **Specialized**: the graph flattened into a linear instruction program.
//!   Only small graphs without enumerables qualify; others fall back to
//!   compiled.
//!
//! In adaptive mode an accessor starts interpreted and is promoted to the
//! fast path once it has been used `PromotionPolicy::threshold` times. The new
//! backend is published atomically; calls already in flight finish on the old
//! one.

mod compiler;
mod interpreter;
mod promotion;
mod specialized;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::call_site::CallSite;
use crate::config::{ProviderOptions, ResolverMode};
use crate::descriptors::AnyArc;
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::observer::Listeners;
use crate::provider::Scope;

pub(crate) use compiler::CompiledFn;
pub(crate) use specialized::SpecializedResolver;

/// The execution tier backing a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverStrategy {
    Interpreted,
    Compiled,
    Specialized,
}

impl fmt::Display for ResolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolverStrategy::Interpreted => "interpreted",
            ResolverStrategy::Compiled => "compiled",
            ResolverStrategy::Specialized => "specialized",
        };
        f.write_str(name)
    }
}

pub(crate) enum Backend {
    Interpreted,
    Compiled(CompiledFn),
    Specialized(SpecializedResolver),
}

impl Backend {
    /// The fastest backend `site` qualifies for.
    fn fast(site: &CallSite, options: &ProviderOptions) -> Self {
        if options.specialize {
            if let Some(program) = SpecializedResolver::build(site, options.specialize_threshold) {
                tracing::trace!(service = site.key().display_name(), instructions = program.len(), "specialized");
                return Backend::Specialized(program);
            }
        }
        Backend::Compiled(compiler::compile(site))
    }

    fn strategy(&self) -> ResolverStrategy {
        match self {
            Backend::Interpreted => ResolverStrategy::Interpreted,
            Backend::Compiled(_) => ResolverStrategy::Compiled,
            Backend::Specialized(_) => ResolverStrategy::Specialized,
        }
    }
}

/// Cached resolution entry point of one service.
pub(crate) struct ServiceAccessor {
    key: Key,
    call_site: Option<Arc<CallSite>>,
    backend: ArcSwap<Backend>,
    calls: AtomicU32,
    promoting: AtomicBool,
    options: ProviderOptions,
    listeners: Listeners,
}

impl ServiceAccessor {
    pub(crate) fn new(
        key: Key,
        call_site: Option<Arc<CallSite>>,
        options: ProviderOptions,
        listeners: Listeners,
    ) -> Self {
        let backend = match (&call_site, options.mode) {
            (Some(site), ResolverMode::Compiled) => Backend::fast(site, &options),
            _ => Backend::Interpreted,
        };

        Self {
            key,
            call_site,
            backend: ArcSwap::from_pointee(backend),
            calls: AtomicU32::new(0),
            promoting: AtomicBool::new(false),
            options,
            listeners,
        }
    }

    pub(crate) fn call_site(&self) -> Option<&Arc<CallSite>> {
        self.call_site.as_ref()
    }

    pub(crate) fn strategy(&self) -> ResolverStrategy {
        self.backend.load().strategy()
    }

    pub(crate) fn resolve(self: &Arc<Self>, scope: &Scope) -> DiResult<AnyArc> {
        let site = self
            .call_site
            .as_ref()
            .ok_or(DiError::NotFound(self.key.display_name()))?;

        // owned, the call may run arbitrary constructors
        let backend = self.backend.load_full();
        match &*backend {
            Backend::Interpreted => {
                self.observe_interpreted_call();
                interpreter::resolve(site, scope)
            }
            Backend::Compiled(resolve) => resolve(scope),
            Backend::Specialized(program) => program.resolve(scope),
        }
    }

    fn observe_interpreted_call(self: &Arc<Self>) {
        if self.options.mode != ResolverMode::Adaptive {
            return;
        }
        let calls = self.calls.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if calls >= self.options.promotion.threshold && !self.promoting.swap(true, Ordering::AcqRel) {
            promotion::schedule(self.clone());
        }
    }

    /// Build the fast backend and install it if the accessor is still interpreted.
    fn promote(&self) {
        let Some(site) = &self.call_site else {
            return;
        };

        let current = self.backend.load();
        if !matches!(**current, Backend::Interpreted) {
            return;
        }

        let fast = Arc::new(Backend::fast(site, &self.options));
        let strategy = fast.strategy();
        let previous = self.backend.compare_and_swap(&current, fast);
        if Arc::ptr_eq(&*previous, &*current) {
            tracing::debug!(service = self.key.display_name(), %strategy, "promoted accessor");
            if !self.listeners.is_empty() {
                self.listeners.promoted(&self.key, strategy);
            }
        }
    }

    pub(crate) fn key(&self) -> Key {
        self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromotionPolicy;

    fn accessor(mode: ResolverMode, background: bool) -> Arc<ServiceAccessor> {
        let options = ProviderOptions::default()
            .with_mode(mode)
            .with_promotion(PromotionPolicy { threshold: 2, background });
        Arc::new(ServiceAccessor::new(Key::of::<u8>(), None, options, Listeners::default()))
    }

    #[test]
    fn accessors_without_a_graph_stay_interpreted() {
        let accessor = accessor(ResolverMode::Compiled, false);
        assert_eq!(accessor.strategy(), ResolverStrategy::Interpreted);
        accessor.promote();
        assert_eq!(accessor.strategy(), ResolverStrategy::Interpreted);
        assert!(accessor.call_site().is_none());
    }

    #[test]
    fn strategy_display_is_lowercase() {
        assert_eq!(ResolverStrategy::Specialized.to_string(), "specialized");
    }
}
