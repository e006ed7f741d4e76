//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::{CacheKey, Key};

pub(crate) const MAX_DEPTH: usize = 1024;

/// Build-time chain of services currently being turned into call-sites.
///
/// Passed down the recursion explicitly so every depth is checked, including
/// the items of an enumerable.
#[derive(Default)]
pub(crate) struct CallSiteChain {
    path: Vec<Key>,
}

impl CallSiteChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail when `key` is already being built further up the chain.
    pub(crate) fn check(&self, key: &Key) -> DiResult<()> {
        if self.path.contains(key) {
            let mut names: Vec<&'static str> = self.path.iter().map(Key::display_name).collect();
            names.push(key.display_name());
            return Err(DiError::Circular(names));
        }
        if self.depth() >= MAX_DEPTH {
            return Err(DiError::DepthExceeded(self.depth()));
        }
        Ok(())
    }

    pub(crate) fn add(&mut self, key: Key) {
        self.path.push(key);
    }

    pub(crate) fn remove(&mut self, key: &Key) {
        if let Some(position) = self.path.iter().rposition(|k| k == key) {
            self.path.truncate(position);
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.path.len()
    }
}

// Factories run outside the call-site graph, so reentrancy is tracked per thread
thread_local! {
    static FACTORY_STACK: RefCell<Vec<Key>> = const { RefCell::new(Vec::new()) };
}

/// Guard marking a factory of `key` as running on this thread.
pub(crate) struct FactoryGuard {
    key: Key,
}

impl FactoryGuard {
    pub(crate) fn enter(key: Key) -> DiResult<Self> {
        FACTORY_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.contains(&key) {
                let mut path: Vec<&'static str> = stack.iter().map(Key::display_name).collect();
                path.push(key.display_name());
                return Err(DiError::Circular(path));
            }
            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(key);
            Ok(Self { key })
        })
    }
}

impl Drop for FactoryGuard {
    fn drop(&mut self) {
        FACTORY_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(last) = stack.pop() {
                debug_assert_eq!(last, self.key);
            }
        });
    }
}

thread_local! {
    static CONSTRUCTING: RefCell<Vec<(usize, CacheKey)>> = const { RefCell::new(Vec::new()) };
}

/// Guard marking a cached entry of one store as under construction on this thread.
///
/// A thread that re-enters an entry it is already building would wait on
/// itself forever; the guard turns that into a circular dependency error.
pub(crate) struct ConstructionGuard {
    entry: (usize, CacheKey),
}

impl ConstructionGuard {
    pub(crate) fn enter(store: usize, cache_key: CacheKey) -> DiResult<Self> {
        let entry = (store, cache_key);
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.contains(&entry) {
                let mut path: Vec<&'static str> = stack.iter().map(|(_, k)| k.key.display_name()).collect();
                path.push(cache_key.key.display_name());
                return Err(DiError::Circular(path));
            }

            stack.push(entry);
            Ok(Self { entry })
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(last) = stack.pop() {
                debug_assert_eq!(last, self.entry);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn chain_reports_full_path() {
        let mut chain = CallSiteChain::new();
        chain.add(Key::of::<A>());
        chain.add(Key::of::<B>());

        match chain.check(&Key::of::<A>()) {
            Err(DiError::Circular(path)) => {
                assert_eq!(path.len(), 3);
                assert!(path[0].ends_with("A"));
                assert!(path[1].ends_with("B"));
                assert!(path[2].ends_with("A"));
            }
            other => panic!("expected circular error, got {:?}", other),
        }

        chain.remove(&Key::of::<B>());
        assert_eq!(chain.depth(), 1);
        assert!(chain.check(&Key::of::<B>()).is_ok());
    }

    #[test]
    fn factory_guard_detects_reentry_and_unwinds() {
        {
            let _outer = FactoryGuard::enter(Key::of::<A>()).unwrap();
            let _inner = FactoryGuard::enter(Key::of::<B>()).unwrap();
            assert!(matches!(
                FactoryGuard::enter(Key::of::<A>()),
                Err(DiError::Circular(_))
            ));
        }
        assert!(FactoryGuard::enter(Key::of::<A>()).is_ok());
    }

    #[test]
    fn construction_guard_is_per_store() {
        let entry = CacheKey::new(Key::of::<A>(), 0);
        let _outer = ConstructionGuard::enter(1, entry).unwrap();
        let _other_store = ConstructionGuard::enter(2, entry).unwrap();

        match ConstructionGuard::enter(1, entry) {
            Err(DiError::Circular(path)) => assert_eq!(path.len(), 3),
            other => panic!("expected circular error, got {:?}", other.map(|_| ())),
        }
    }
}
