//! Service provider and the resolution engine behind it.
//!
//! The [`Engine`] composes the call-site factory, the per-service accessor
//! cache, the optional validator and the listeners. It holds no scopes; the
//! root [`Scope`] owns the engine and every child scope owns a handle to the
//! root, so dropping the provider and its scopes frees everything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::call_site::CallSiteFactory;
use crate::config::ProviderOptions;
use crate::descriptors::{AnyArc, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::internal::CallSiteChain;
use crate::key::Key;
use crate::observer::Listeners;
use crate::registration::DescriptorIndex;
use crate::resolver::{ResolverStrategy, ServiceAccessor};
use crate::traits::ResolverCore;
use crate::validation::CallSiteValidator;

mod scope;
pub(crate) mod store;

pub use scope::{Scope, ScopeFactory};

pub(crate) struct Engine {
    call_sites: CallSiteFactory,
    accessors: DashMap<Key, Arc<ServiceAccessor>, ahash::RandomState>,
    validator: Option<CallSiteValidator>,
    options: ProviderOptions,
    listeners: Listeners,
    next_scope_id: AtomicU64,
}

impl Engine {
    fn new(descriptors: Vec<ServiceDescriptor>, listeners: Listeners, options: ProviderOptions) -> Self {
        Self {
            call_sites: CallSiteFactory::new(DescriptorIndex::new(descriptors), listeners.clone()),
            accessors: DashMap::with_hasher(ahash::RandomState::new()),
            validator: options.validate_scopes.then(CallSiteValidator::new),
            options,
            listeners,
            next_scope_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_scope_id(&self) -> u64 {
        self.next_scope_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Cached accessor of `key`, building its call-site graph on first use.
    ///
    /// Graph-build and validation errors are returned, never cached.
    fn accessor(&self, key: Key) -> DiResult<Arc<ServiceAccessor>> {
        if let Some(accessor) = self.accessors.get(&key) {
            return Ok(accessor.clone());
        }

        let call_site = self.call_sites.get_call_site(key, &mut CallSiteChain::new())?;
        if let (Some(validator), Some(site)) = (&self.validator, &call_site) {
            validator.validate_call_site(site)?;
        }

        let accessor = Arc::new(ServiceAccessor::new(key, call_site, self.options, self.listeners.clone()));
        let winner = self.accessors.entry(key).or_insert(accessor).clone();
        Ok(winner)
    }

    pub(crate) fn resolve(&self, key: Key, scope: &Scope) -> DiResult<Option<AnyArc>> {
        if scope.is_disposed() {
            return Err(DiError::ScopeDisposed);
        }

        let accessor = self.accessor(key)?;
        let Some(site) = accessor.call_site() else {
            return Ok(None);
        };

        if scope.is_root() {
            if let Some(validator) = &self.validator {
                validator.validate_resolution(site, key)?;
            }
        }

        let value = accessor.resolve(scope)?;
        if !self.listeners.is_empty() {
            self.listeners.resolved(&key, scope.id());
        }
        Ok(Some(value))
    }

    fn strategy(&self, key: Key) -> Option<ResolverStrategy> {
        self.accessors.get(&key).map(|accessor| accessor.strategy())
    }

    /// Build and validate the graph of every registered service.
    fn validate_all(&self) -> DiResult<()> {
        let index = self.call_sites.index();
        let mut keys: Vec<Key> = index.keys().to_vec();
        keys.extend(
            index
                .keys()
                .iter()
                .filter(|key| index.count(key) > 1)
                .map(|key| Key::Many(key.type_id(), key.display_name())),
        );

        let errors: Vec<DiError> = keys
            .into_iter()
            .filter_map(|key| self.accessor(key).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::Validation(errors))
        }
    }
}

/// Service provider for resolving dependencies from the container.
///
/// The provider is a handle to the root scope: it resolves singletons and
/// root-level transients, creates child scopes, and owns the engine.
///
/// # Thread Safety
///
/// `ServiceProvider` is `Send + Sync` and cheap to clone. Call-site graphs and
/// accessors are built lazily and shared by every thread and scope.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Constructor, Injectable, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Foo: Send + Sync {}
/// struct FooImpl;
/// impl Foo for FooImpl {}
/// impl Injectable for FooImpl {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|| FooImpl)]
///     }
/// }
///
/// struct Bar {
///     foo: Arc<dyn Foo>,
/// }
/// impl Injectable for Bar {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|foo: Arc<dyn Foo>| Bar { foo })]
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_as::<dyn Foo, FooImpl>(|foo| foo);
/// services.add_transient_type::<Bar>();
///
/// let provider = services.build();
/// let first = provider.get_required::<Bar>();
/// let second = provider.get_required::<Bar>();
///
/// assert!(!Arc::ptr_eq(&first, &second));
/// assert!(Arc::ptr_eq(&first.foo, &second.foo));
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    root: Scope,
}

impl ServiceProvider {
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>, listeners: Listeners, options: ProviderOptions) -> Self {
        let engine = Arc::new(Engine::new(descriptors, listeners, options));
        tracing::debug!(
            registrations = engine.call_sites.index().descriptors().len(),
            mode = ?options.mode,
            validate_scopes = options.validate_scopes,
            "service provider built"
        );

        Self {
            root: Scope::new_root(engine),
        }
    }

    /// Build (and, with scope validation on, validate) the call-site graph of
    /// every registered service, plus the collection of every multiply
    /// registered service.
    ///
    /// All failures are reported together as [`DiError::Validation`].
    pub fn validate(&self) -> DiResult<()> {
        self.root.engine().validate_all()
    }

    /// The root scope.
    pub fn root_scope(&self) -> &Scope {
        &self.root
    }

    /// Creates a new scope for resolving scoped services.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_resolve::{ServiceCollection, Resolver};
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::sync::Arc;
    ///
    /// struct RequestId(u32);
    ///
    /// let counter = Arc::new(AtomicU32::new(0));
    /// let next = counter.clone();
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_scoped_factory::<RequestId, _>(move |_| {
    ///     RequestId(next.fetch_add(1, Ordering::SeqCst) + 1)
    /// });
    ///
    /// let provider = collection.build();
    /// let scope1 = provider.create_scope();
    /// let scope2 = provider.create_scope();
    ///
    /// let req1a = scope1.get_required::<RequestId>();
    /// let req1b = scope1.get_required::<RequestId>(); // Same instance
    /// let req2 = scope2.get_required::<RequestId>(); // Different instance
    ///
    /// assert!(Arc::ptr_eq(&req1a, &req1b));
    /// assert!(!Arc::ptr_eq(&req1a, &req2));
    /// assert_eq!(counter.load(Ordering::SeqCst), 2);
    /// ```
    pub fn create_scope(&self) -> Scope {
        self.root.create_scope()
    }

    /// A scope-creation capability detached from this handle.
    pub fn scope_factory(&self) -> ScopeFactory {
        ScopeFactory::new(self.root.clone())
    }

    /// Dispose the root scope: singletons and root-resolved transients.
    ///
    /// Afterwards every scope of this provider rejects new resolutions.
    pub fn dispose(&self) -> DiResult<()> {
        self.root.dispose()
    }

    pub async fn dispose_async(&self) -> DiResult<()> {
        self.root.dispose_async().await
    }

    pub fn is_disposed(&self) -> bool {
        self.root.is_disposed()
    }

    /// Execution tier currently backing `T`, or `None` if `T` was never resolved.
    pub fn strategy<T: ?Sized + 'static>(&self) -> Option<ResolverStrategy> {
        self.strategy_of(Key::of::<T>())
    }

    pub fn strategy_of(&self, key: Key) -> Option<ResolverStrategy> {
        self.root.engine().strategy(key)
    }

    /// Registrations and built accessors, for debugging.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write;

        let engine = self.root.engine();
        let mut out = String::new();
        let _ = writeln!(out, "ServiceProvider (mode: {:?})", engine.options.mode);
        let _ = writeln!(out, "Registrations:");
        for descriptor in engine.call_sites.index().descriptors() {
            let _ = writeln!(
                out,
                "  {} [{}] -> {}",
                descriptor.type_name(),
                descriptor.lifetime(),
                descriptor.implementation_name().unwrap_or(if descriptor.is_factory() {
                    "<factory>"
                } else {
                    "<instance>"
                })
            );
        }
        let _ = writeln!(out, "Accessors:");
        for entry in engine.accessors.iter() {
            let accessor = entry.value();
            let nodes = accessor.call_site().map_or(0, |site| site.node_count());
            let _ = writeln!(
                out,
                "  {} ({}, {} nodes)",
                accessor.key(),
                accessor.strategy(),
                nodes
            );
        }
        out
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_key(&self, key: Key) -> DiResult<Option<AnyArc>> {
        self.root.resolve_key(key)
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let engine = self.root.engine();
        f.debug_struct("ServiceProvider")
            .field("registrations", &engine.call_sites.index().descriptors().len())
            .field("call_sites", &engine.call_sites.cached())
            .field("accessors", &engine.accessors.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
