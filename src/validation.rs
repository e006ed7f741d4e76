//! Scope validation over call-site graphs.
//!
//! Two rules, both enabled by [`ProviderOptions::validate_scopes`](crate::ProviderOptions::validate_scopes):
//!
//! - **Singleton → Scoped**: a singleton whose graph reaches a scoped service
//!   would hold that scoped instance forever. Rejected when the graph is built.
//! - **Root → Scoped**: resolving from the root scope a service whose graph
//!   reaches a scoped service (or a scoped service itself) would leak a
//!   per-scope instance into the root. Rejected at every root resolution, so
//!   an accessor cached by a child scope cannot be misused from the root.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::call_site::{CallSite, Node};
use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Scope-leak validator with a per-call-site memo.
pub(crate) struct CallSiteValidator {
    /// Call-site identity → first scoped service it reaches outside singletons.
    /// The `Arc` keeps the address from being reused.
    scoped: DashMap<usize, (Arc<CallSite>, Option<&'static str>), ahash::RandomState>,
}

impl CallSiteValidator {
    pub(crate) fn new() -> Self {
        Self {
            scoped: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Reject singletons that capture scoped services anywhere in `site`.
    pub(crate) fn validate_call_site(&self, site: &Arc<CallSite>) -> DiResult<()> {
        let mut visited = HashSet::new();
        self.check_singletons(site, &mut visited)
    }

    /// Reject resolving `site` from the root scope when it reaches a scoped service.
    pub(crate) fn validate_resolution(&self, site: &Arc<CallSite>, requested: Key) -> DiResult<()> {
        match self.scoped_dependency(site) {
            Some(scoped) => Err(DiError::ScopedFromRoot {
                service: requested.display_name(),
                scoped,
            }),
            None => Ok(()),
        }
    }

    fn check_singletons(&self, site: &Arc<CallSite>, visited: &mut HashSet<usize>) -> DiResult<()> {
        if !visited.insert(identity(site)) {
            return Ok(());
        }

        if let Node::Singleton { inner, .. } = &site.node {
            if let Some(scoped) = self.scoped_dependency(inner) {
                return Err(DiError::ScopedFromSingleton {
                    singleton: site.key().display_name(),
                    scoped,
                });
            }
        }

        for dependency in site.dependencies() {
            self.check_singletons(dependency, visited)?;
        }
        Ok(())
    }

    /// First scoped service `site` reaches without crossing a singleton boundary.
    fn scoped_dependency(&self, site: &Arc<CallSite>) -> Option<&'static str> {
        let id = identity(site);
        if let Some(entry) = self.scoped.get(&id) {
            return entry.1;
        }

        let found = match &site.node {
            Node::Scoped { .. } => Some(site.key().display_name()),
            // resolved against the root; checked by the singleton rule
            Node::Singleton { .. } => None,
            _ => site
                .dependencies()
                .iter()
                .find_map(|dependency| self.scoped_dependency(dependency)),
        };

        self.scoped.entry(id).or_insert_with(|| (site.clone(), found));
        found
    }
}

fn identity(site: &Arc<CallSite>) -> usize {
    Arc::as_ptr(site) as usize
}
