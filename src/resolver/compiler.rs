//! Lowers a call-site graph into nested closures.
//!
//! The graph is walked once; the resulting closure only dispatches on the
//! scope it is called with, so one compiled accessor serves every scope.

use std::sync::Arc;

use crate::call_site::{CallSite, Node};
use crate::descriptors::{erase, AnyArc, Constructed, ServiceList};
use crate::error::DiResult;
use crate::internal::FactoryGuard;
use crate::provider::{Scope, ScopeFactory};

pub(crate) type CompiledFn = Arc<dyn Fn(&Scope) -> DiResult<AnyArc> + Send + Sync>;
type ConstructFn = Arc<dyn Fn(&Scope) -> DiResult<Constructed> + Send + Sync>;

/// Closure resolving `site`, equivalent to the interpreter.
pub(crate) fn compile(site: &CallSite) -> CompiledFn {
    match &site.node {
        Node::Singleton { cache_key, inner } => {
            let construct = lower(inner);
            let cache_key = *cache_key;
            Arc::new(move |scope: &Scope| {
                let root = scope.root();
                root.store().get_or_construct(cache_key, || construct(root))
            })
        }
        Node::Scoped { cache_key, inner } => {
            let construct = lower(inner);
            let cache_key = *cache_key;
            Arc::new(move |scope: &Scope| {
                scope
                    .store()
                    .get_or_construct(cache_key, || construct(scope))
            })
        }
        _ => {
            let construct = lower(site);
            Arc::new(move |scope: &Scope| {
                let constructed = construct(scope)?;
                scope.store().track(constructed)
            })
        }
    }
}

fn lower(site: &CallSite) -> ConstructFn {
    match &site.node {
        Node::Constructor { invoke, params, .. } => {
            let invoke = invoke.clone();
            match params.as_slice() {
                [] => Arc::new(move |_: &Scope| invoke(Vec::new())),
                [only] => {
                    let only = compile(only);
                    Arc::new(move |scope: &Scope| invoke(vec![only(scope)?]))
                }
                params => {
                    let params: Vec<CompiledFn> = params.iter().map(|param| compile(param)).collect();
                    Arc::new(move |scope: &Scope| {
                        let mut args = Vec::with_capacity(params.len());
                        for param in &params {
                            args.push(param(scope)?);
                        }
                        invoke(args)
                    })
                }
            }
        }
        Node::Constant { value } => {
            let value = value.clone();
            Arc::new(move |_: &Scope| Ok(Constructed::untracked(value.clone())))
        }
        Node::Factory { factory } => {
            let factory = factory.clone();
            let key = site.key();
            Arc::new(move |scope: &Scope| {
                let _guard = FactoryGuard::enter(key)?;
                factory(scope)
            })
        }
        Node::Enumerable { items } => {
            let items: Vec<CompiledFn> = items.iter().map(|item| compile(item)).collect();
            Arc::new(move |scope: &Scope| {
                let values = items
                    .iter()
                    .map(|item| item(scope))
                    .collect::<DiResult<Vec<_>>>()?;
                Ok(Constructed::untracked(erase(Arc::new(ServiceList(values)))))
            })
        }
        Node::ServiceProvider => {
            Arc::new(|scope: &Scope| Ok(Constructed::untracked(erase(Arc::new(scope.clone())))))
        }
        Node::ScopeFactory => Arc::new(|scope: &Scope| {
            Ok(Constructed::untracked(erase(Arc::new(ScopeFactory::new(
                scope.root().clone(),
            )))))
        }),
        Node::Singleton { .. } | Node::Scoped { .. } => {
            let resolve = compile(site);
            Arc::new(move |scope: &Scope| resolve(scope).map(Constructed::untracked))
        }
    }
}
