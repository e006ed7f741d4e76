//! Scopes and scope lifecycle management.

use std::sync::Arc;

use super::store::ServiceStore;
use super::Engine;
use crate::descriptors::AnyArc;
use crate::error::DiResult;
use crate::key::Key;
use crate::traits::{Disposable, ResolverCore};

/// A unit-of-work boundary owning its scoped instances and disposables.
///
/// Scopes are cheap handles; clones refer to the same scope. Every scope is a
/// direct child of the provider's root scope: singletons are cached in the
/// root, scoped services in the scope that resolved them, and transients are
/// tracked for disposal by the scope they were resolved in.
///
/// # Lifetime Behavior
///
/// - **Singleton**: Resolved and cached in the root scope (shared by all scopes)
/// - **Scoped**: Resolved and cached within this specific scope
/// - **Transient**: Created fresh on every resolution (no caching)
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
///
/// struct UserService {
///     db: Arc<DatabaseConnection>,
/// }
///
/// let mut collection = ServiceCollection::new();
///
/// // Scoped database connection per request
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     DatabaseConnection("connection-123".to_string())
/// });
///
/// // Transient user service that uses scoped DB connection
/// collection.add_transient_factory::<UserService, _>(|scope| {
///     UserService {
///         db: scope.get_required::<DatabaseConnection>(),
///     }
/// });
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// // Multiple services in the same scope share the same DB connection
/// let user1 = scope.get_required::<UserService>();
/// let user2 = scope.get_required::<UserService>();
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
///
/// scope.dispose().unwrap();
/// assert!(scope.get::<UserService>().is_err());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    id: u64,
    engine: Arc<Engine>,
    store: ServiceStore,
    /// `None` for the root scope itself
    root: Option<Scope>,
}

impl Scope {
    pub(crate) fn new_root(engine: Arc<Engine>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: 0,
                engine,
                store: ServiceStore::new(),
                root: None,
            }),
        }
    }

    /// Identifier of this scope; the root scope is 0.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_root(&self) -> bool {
        self.inner.root.is_none()
    }

    /// The provider's root scope (itself for the root).
    pub fn root(&self) -> &Scope {
        self.inner.root.as_ref().unwrap_or(self)
    }

    /// Whether this scope, or the root it belongs to, has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.store.is_disposed() || self.root().inner.store.is_disposed()
    }

    /// Create a new child of the root scope.
    pub fn create_scope(&self) -> Scope {
        let root = self.root().clone();
        let id = root.inner.engine.next_scope_id();
        tracing::trace!(scope_id = id, "scope created");

        Self {
            inner: Arc::new(ScopeInner {
                id,
                engine: root.inner.engine.clone(),
                store: ServiceStore::new(),
                root: Some(root),
            }),
        }
    }

    /// Track an externally created disposable with this scope.
    ///
    /// Useful for factories that create resources besides the value they return.
    pub fn register_disposable(&self, disposable: Disposable) -> DiResult<()> {
        self.inner.store.capture(disposable)
    }

    /// Dispose every tracked instance, most recently constructed first.
    ///
    /// Idempotent: later calls do nothing. Every disposable is attempted even if
    /// some fail; the failures are returned together as [`DiError::Disposal`](crate::DiError::Disposal).
    /// Async-only disposables fail with [`DiError::AsyncDisposalRequired`](crate::DiError::AsyncDisposalRequired); use
    /// [`dispose_async`](Self::dispose_async) for them.
    pub fn dispose(&self) -> DiResult<()> {
        tracing::trace!(scope_id = self.id(), "disposing scope");
        self.inner.store.dispose()
    }

    /// Like [`dispose`](Self::dispose), awaiting async disposal where supported.
    pub async fn dispose_async(&self) -> DiResult<()> {
        tracing::trace!(scope_id = self.id(), "disposing scope asynchronously");
        self.inner.store.dispose_async().await
    }

    pub(crate) fn store(&self) -> &ServiceStore {
        &self.inner.store
    }

    pub(crate) fn engine(&self) -> &Arc<Engine> {
        &self.inner.engine
    }
}

impl ResolverCore for Scope {
    fn resolve_key(&self, key: Key) -> DiResult<Option<AnyArc>> {
        self.inner.engine.resolve(key, self)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("disposed", &self.is_disposed())
            .field("instances", &self.inner.store.len())
            .finish()
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let pending = self.store.pending_disposables();
        if !self.store.is_disposed() && pending > 0 {
            tracing::warn!(
                scope_id = self.id,
                pending,
                "scope dropped with undisposed resources; call dispose() or dispose_async() first"
            );
        }
    }
}

/// Capability to create scopes, injectable as `Arc<ScopeFactory>`.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Resolver, ScopeFactory, ServiceCollection};
///
/// let provider = ServiceCollection::new().build();
/// let factory = provider.get_required::<ScopeFactory>();
/// let scope = factory.create_scope();
/// assert!(!scope.is_root());
/// ```
#[derive(Clone)]
pub struct ScopeFactory {
    root: Scope,
}

impl ScopeFactory {
    pub(crate) fn new(root: Scope) -> Self {
        Self { root }
    }

    pub fn create_scope(&self) -> Scope {
        self.root.create_scope()
    }
}

impl std::fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeFactory").finish_non_exhaustive()
    }
}
