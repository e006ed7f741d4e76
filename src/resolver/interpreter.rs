//! Tree-walking resolver over the call-site graph.
//!
//! No warm-up cost; every call re-walks the graph. Always available and the
//! reference behavior the faster strategies must match.

use std::sync::Arc;

use crate::call_site::{CallSite, Node};
use crate::descriptors::{erase, AnyArc, Constructed, ServiceList};
use crate::error::DiResult;
use crate::internal::FactoryGuard;
use crate::provider::{Scope, ScopeFactory};

/// Resolve `site` in `scope`, caching and tracking per the node's lifetime.
pub(crate) fn resolve(site: &CallSite, scope: &Scope) -> DiResult<AnyArc> {
    match &site.node {
        Node::Singleton { cache_key, inner } => {
            let root = scope.root();
            root.store().get_or_construct(*cache_key, || construct(inner, root))
        }
        Node::Scoped { cache_key, inner } => scope
            .store()
            .get_or_construct(*cache_key, || construct(inner, scope)),
        _ => {
            let constructed = construct(site, scope)?;
            scope.store().track(constructed)
        }
    }
}

fn construct(site: &CallSite, scope: &Scope) -> DiResult<Constructed> {
    match &site.node {
        Node::Constructor { invoke, params, .. } => {
            let args = params
                .iter()
                .map(|param| resolve(param, scope))
                .collect::<DiResult<Vec<_>>>()?;
            invoke(args)
        }
        Node::Constant { value } => Ok(Constructed::untracked(value.clone())),
        Node::Factory { factory } => {
            let _guard = FactoryGuard::enter(site.key())?;
            factory(scope)
        }
        Node::Enumerable { items } => {
            let values = items
                .iter()
                .map(|item| resolve(item, scope))
                .collect::<DiResult<Vec<_>>>()?;
            Ok(Constructed::untracked(erase(Arc::new(ServiceList(values)))))
        }
        Node::ServiceProvider => Ok(Constructed::untracked(erase(Arc::new(scope.clone())))),
        Node::ScopeFactory => Ok(Constructed::untracked(erase(Arc::new(ScopeFactory::new(
            scope.root().clone(),
        ))))),
        Node::Singleton { .. } | Node::Scoped { .. } => resolve(site, scope).map(Constructed::untracked),
    }
}
