//! Call-site graph: the immutable resolution plan.
//!
//! A [`CallSite`] describes how to produce one value. The graph for a service
//! is built once by the [`CallSiteFactory`](factory::CallSiteFactory) and then
//! shared by every scope and every execution strategy.

pub(crate) mod factory;

use std::fmt;
use std::sync::Arc;

use crate::descriptors::{AnyArc, ConstructorInvoker, FactoryFn};
use crate::key::{CacheKey, Key};
use crate::lifetime::Lifetime;

pub(crate) use factory::CallSiteFactory;

/// Node kinds of the resolution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSiteKind {
    /// Constructor invocation over parameter call-sites
    Constructor,
    /// Pre-built instance
    Constant,
    /// User factory receiving the current scope
    Factory,
    /// Inner call-site cached once per provider
    Singleton,
    /// Inner call-site cached once per scope
    Scoped,
    /// Every registration of a service, in order
    Enumerable,
    /// The current scope
    ServiceProvider,
    /// Scope-creation capability
    ScopeFactory,
}

pub(crate) enum Node {
    Constructor {
        implementation: &'static str,
        invoke: ConstructorInvoker,
        params: Vec<Arc<CallSite>>,
    },
    Constant {
        value: AnyArc,
    },
    Factory {
        factory: FactoryFn,
    },
    Singleton {
        cache_key: CacheKey,
        inner: Arc<CallSite>,
    },
    Scoped {
        cache_key: CacheKey,
        inner: Arc<CallSite>,
    },
    Enumerable {
        items: Vec<Arc<CallSite>>,
    },
    ServiceProvider,
    ScopeFactory,
}

/// One node of the resolution plan for `key`.
pub struct CallSite {
    key: Key,
    pub(crate) node: Node,
}

impl CallSite {
    pub(crate) fn new(key: Key, node: Node) -> Self {
        Self { key, node }
    }

    /// The service this node produces.
    pub fn key(&self) -> Key {
        self.key
    }

    pub fn kind(&self) -> CallSiteKind {
        match &self.node {
            Node::Constructor { .. } => CallSiteKind::Constructor,
            Node::Constant { .. } => CallSiteKind::Constant,
            Node::Factory { .. } => CallSiteKind::Factory,
            Node::Singleton { .. } => CallSiteKind::Singleton,
            Node::Scoped { .. } => CallSiteKind::Scoped,
            Node::Enumerable { .. } => CallSiteKind::Enumerable,
            Node::ServiceProvider => CallSiteKind::ServiceProvider,
            Node::ScopeFactory => CallSiteKind::ScopeFactory,
        }
    }

    /// Caching behavior of this node's value.
    ///
    /// Constants behave like singletons; synthetic nodes and bare constructors,
    /// factories and enumerables are transient.
    pub fn lifetime(&self) -> Lifetime {
        match &self.node {
            Node::Singleton { .. } | Node::Constant { .. } => Lifetime::Singleton,
            Node::Scoped { .. } => Lifetime::Scoped,
            _ => Lifetime::Transient,
        }
    }

    /// Lifetime-store identity of a singleton or scoped node.
    pub fn cache_key(&self) -> Option<CacheKey> {
        match &self.node {
            Node::Singleton { cache_key, .. } | Node::Scoped { cache_key, .. } => Some(*cache_key),
            _ => None,
        }
    }

    /// Implementation type of a constructor node, looking through lifetime wrappers.
    pub fn implementation_name(&self) -> Option<&'static str> {
        match &self.node {
            Node::Constructor { implementation, .. } => Some(*implementation),
            Node::Singleton { inner, .. } | Node::Scoped { inner, .. } => inner.implementation_name(),
            _ => None,
        }
    }

    /// Direct children: constructor parameters, the wrapped node or enumerable items.
    pub fn dependencies(&self) -> &[Arc<CallSite>] {
        match &self.node {
            Node::Constructor { params, .. } => params,
            Node::Singleton { inner, .. } | Node::Scoped { inner, .. } => std::slice::from_ref(inner),
            Node::Enumerable { items } => items,
            _ => &[],
        }
    }

    /// Size of the tree rooted here, counting shared subtrees once per use.
    pub fn node_count(&self) -> usize {
        1 + self.dependencies().iter().map(|d| d.node_count()).sum::<usize>()
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("CallSite");
        debug.field("key", &self.key).field("kind", &self.kind());
        if let Some(cache_key) = self.cache_key() {
            debug.field("slot", &cache_key.slot);
        }
        if !self.dependencies().is_empty() {
            debug.field("dependencies", &self.dependencies());
        }
        debug.finish()
    }
}
