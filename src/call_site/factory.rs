//! Call-site graph builder.

use std::cmp::Reverse;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::call_site::{CallSite, Node};
use crate::descriptors::{ErasedConstructor, ImplementationSource, ImplementationType, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::internal::CallSiteChain;
use crate::key::{CacheKey, Key};
use crate::lifetime::Lifetime;
use crate::observer::Listeners;
use crate::provider::{Scope, ScopeFactory};
use crate::registration::DescriptorIndex;

enum Candidate {
    Resolvable(Vec<Arc<CallSite>>),
    Missing(Key),
}

/// Builds and memoizes call-site graphs.
///
/// The memo is append-only and keyed by [`CacheKey`] so the items of an
/// enumerable share nodes with single resolutions. Concurrent builders of the
/// same key may race; the first inserted graph wins and the rest are dropped.
/// Failed builds are never cached.
pub(crate) struct CallSiteFactory {
    index: DescriptorIndex,
    cache: DashMap<CacheKey, Arc<CallSite>, ahash::RandomState>,
    listeners: Listeners,
}

impl CallSiteFactory {
    pub(crate) fn new(index: DescriptorIndex, listeners: Listeners) -> Self {
        Self {
            index,
            cache: DashMap::with_hasher(ahash::RandomState::new()),
            listeners,
        }
    }

    pub(crate) fn index(&self) -> &DescriptorIndex {
        &self.index
    }

    /// Graph for `key`, or `None` when the service has no binding.
    ///
    /// Collection keys always produce a graph, possibly with no items.
    pub(crate) fn get_call_site(&self, key: Key, chain: &mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>> {
        let cache_key = CacheKey::new(key, 0);
        if let Some(site) = self.cache.get(&cache_key) {
            return Ok(Some(site.clone()));
        }

        if key == Key::of::<Scope>() {
            return Ok(Some(self.publish(cache_key, CallSite::new(key, Node::ServiceProvider))));
        }
        if key == Key::of::<ScopeFactory>() {
            return Ok(Some(self.publish(cache_key, CallSite::new(key, Node::ScopeFactory))));
        }

        if !key.is_many() && !self.index.contains(&key) {
            return Ok(None);
        }
        chain.check(&key)?;

        if key.is_many() {
            return self.build_enumerable(key, chain).map(Some);
        }
        match self.index.last(&key) {
            Some(descriptor) => self.build_descriptor(descriptor, 0, chain).map(Some),
            None => Ok(None),
        }
    }

    fn build_enumerable(&self, key: Key, chain: &mut CallSiteChain) -> DiResult<Arc<CallSite>> {
        let count = self.index.count(&key);

        chain.add(key);
        let items: DiResult<Vec<_>> = self
            .index
            .registrations(&key)
            .enumerate()
            .map(|(position, descriptor)| self.build_descriptor(descriptor, count - 1 - position, chain))
            .collect();
        chain.remove(&key);

        let site = CallSite::new(key, Node::Enumerable { items: items? });
        Ok(self.publish(CacheKey::new(key, 0), site))
    }

    fn build_descriptor(
        &self,
        descriptor: &ServiceDescriptor,
        slot: usize,
        chain: &mut CallSiteChain,
    ) -> DiResult<Arc<CallSite>> {
        let key = descriptor.key();
        let cache_key = CacheKey::new(key, slot);
        if let Some(site) = self.cache.get(&cache_key) {
            return Ok(site.clone());
        }

        let node = match descriptor.source() {
            ImplementationSource::Instance(value) => {
                let site = CallSite::new(key, Node::Constant { value: value.clone() });
                return Ok(self.publish(cache_key, site));
            }
            ImplementationSource::Factory(factory) => CallSite::new(
                key,
                Node::Factory {
                    factory: factory.clone(),
                },
            ),
            ImplementationSource::Type(implementation) => self.build_constructor(key, implementation, chain)?,
        };

        let site = match descriptor.lifetime() {
            Lifetime::Singleton => CallSite::new(
                key,
                Node::Singleton {
                    cache_key,
                    inner: Arc::new(node),
                },
            ),
            Lifetime::Scoped => CallSite::new(
                key,
                Node::Scoped {
                    cache_key,
                    inner: Arc::new(node),
                },
            ),
            Lifetime::Transient => node,
        };
        Ok(self.publish(cache_key, site))
    }

    fn build_constructor(
        &self,
        key: Key,
        implementation: &ImplementationType,
        chain: &mut CallSiteChain,
    ) -> DiResult<CallSite> {
        chain.check(&key)?;
        chain.add(key);
        let selected = self.select_constructor(implementation, chain);
        chain.remove(&key);

        let (ctor, params) = selected?;
        Ok(CallSite::new(
            key,
            Node::Constructor {
                implementation: implementation.name,
                invoke: ctor.invoke.clone(),
                params,
            },
        ))
    }

    /// Pick the constructor with the most parameters whose every parameter is
    /// resolvable; a tie at that arity is ambiguous.
    fn select_constructor<'a>(
        &self,
        implementation: &'a ImplementationType,
        chain: &mut CallSiteChain,
    ) -> DiResult<(&'a ErasedConstructor, Vec<Arc<CallSite>>)> {
        if implementation.constructors.is_empty() {
            return Err(DiError::NoConstructor(implementation.name));
        }

        let mut candidates: Vec<&ErasedConstructor> = implementation.constructors.iter().collect();
        candidates.sort_by_key(|ctor| Reverse(ctor.params.len()));

        let mut selected: Option<(&ErasedConstructor, Vec<Arc<CallSite>>)> = None;
        let mut first_missing: Option<Key> = None;

        for ctor in candidates {
            let arity = ctor.params.len();
            if let Some((best, _)) = &selected {
                if arity < best.params.len() {
                    break;
                }
            }

            match self.build_params(ctor, chain)? {
                Candidate::Resolvable(params) => {
                    if selected.is_some() {
                        return Err(DiError::AmbiguousConstructor {
                            implementation: implementation.name,
                            arity,
                        });
                    }
                    selected = Some((ctor, params));
                }
                Candidate::Missing(dependency) => {
                    first_missing.get_or_insert(dependency);
                }
            }
        }

        match (selected, first_missing) {
            (Some(selected), _) => Ok(selected),
            (None, Some(dependency)) => Err(DiError::MissingDependency {
                service: implementation.name,
                dependency: dependency.display_name(),
            }),
            (None, None) => Err(DiError::NoConstructor(implementation.name)),
        }
    }

    fn build_params(&self, ctor: &ErasedConstructor, chain: &mut CallSiteChain) -> DiResult<Candidate> {
        let mut params = Vec::with_capacity(ctor.params.len());
        for &param in &ctor.params {
            match self.get_call_site(param, chain)? {
                Some(site) => params.push(site),
                None => return Ok(Candidate::Missing(param)),
            }
        }
        Ok(Candidate::Resolvable(params))
    }

    fn publish(&self, cache_key: CacheKey, site: CallSite) -> Arc<CallSite> {
        let site = Arc::new(site);
        let (winner, inserted) = match self.cache.entry(cache_key) {
            Entry::Occupied(existing) => (existing.get().clone(), false),
            Entry::Vacant(vacant) => {
                vacant.insert(site.clone());
                (site, true)
            }
        };

        if inserted {
            tracing::debug!(
                service = cache_key.key.display_name(),
                slot = cache_key.slot,
                kind = ?winner.kind(),
                "built call site"
            );
            if !self.listeners.is_empty() {
                self.listeners.call_site_built(&cache_key.key, &winner);
            }
        }
        winner
    }

    pub(crate) fn cached(&self) -> usize {
        self.cache.len()
    }
}
