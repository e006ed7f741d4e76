//! Per-scope instance and disposal store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::descriptors::{AnyArc, Constructed};
use crate::error::{DiError, DiResult};
use crate::internal::{ConstructionGuard, DisposeBag};
use crate::key::CacheKey;
use crate::traits::Disposable;

type Slot = Arc<OnceCell<AnyArc>>;

/// Realized instances of one scope plus the disposables it owns.
///
/// Each cached entry owns a once-cell slot. The map lock is held only to find
/// or insert the slot; construction runs inside the slot's initializer, so
/// racing first resolutions of one entry build it exactly once while
/// constructors stay free to resolve other entries of the same store.
pub(crate) struct ServiceStore {
    resolved: Mutex<HashMap<CacheKey, Slot, ahash::RandomState>>,
    disposables: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ServiceStore {
    pub(crate) fn new() -> Self {
        Self {
            resolved: Mutex::new(HashMap::default()),
            disposables: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &CacheKey) -> Option<AnyArc> {
        self.resolved.lock().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Cached value for `key`, constructing it with `construct` when absent.
    ///
    /// Concurrent callers for the same entry wait for the first one. A failed
    /// construction leaves the entry empty for the next caller.
    pub(crate) fn get_or_construct<F>(&self, key: CacheKey, construct: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<Constructed>,
    {
        let slot = {
            let mut resolved = self.resolved.lock();
            if self.is_disposed() {
                return Err(DiError::ScopeDisposed);
            }
            resolved.entry(key).or_default().clone()
        };
        if let Some(value) = slot.get() {
            return Ok(value.clone());
        }

        let _guard = ConstructionGuard::enter(self as *const Self as usize, key)?;
        slot.get_or_try_init(|| {
            let constructed = construct()?;
            if let Some(disposal) = constructed.disposal {
                self.capture(disposal)?;
            }
            Ok::<_, DiError>(constructed.value)
        })
        .cloned()
    }

    /// Record the disposal of an uncached value and hand the value back.
    pub(crate) fn track(&self, constructed: Constructed) -> DiResult<AnyArc> {
        if let Some(disposal) = constructed.disposal {
            self.capture(disposal)?;
        }
        Ok(constructed.value)
    }

    /// Append `disposal` to this store's teardown list.
    ///
    /// A disposable captured after teardown is disposed immediately and the
    /// capture fails.
    pub(crate) fn capture(&self, disposal: Disposable) -> DiResult<()> {
        {
            let mut bag = self.disposables.lock();
            if !self.is_disposed() {
                bag.push(disposal);
                return Ok(());
            }
        }
        dispose_now(disposal);
        Err(DiError::ScopeDisposed)
    }

    #[inline]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn pending_disposables(&self) -> usize {
        self.disposables.lock().len()
    }

    pub(crate) fn len(&self) -> usize {
        self.resolved.lock().values().filter(|slot| slot.get().is_some()).count()
    }

    /// Mark disposed and hand back what must be torn down; `None` if already disposed.
    fn begin_dispose(&self) -> Option<DisposeBag> {
        let bag = {
            let mut bag = self.disposables.lock();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return None;
            }
            std::mem::take(&mut *bag)
        };
        self.resolved.lock().clear();
        Some(bag)
    }

    pub(crate) fn dispose(&self) -> DiResult<()> {
        match self.begin_dispose() {
            Some(bag) => bag.dispose_reverse(),
            None => Ok(()),
        }
    }

    pub(crate) async fn dispose_async(&self) -> DiResult<()> {
        match self.begin_dispose() {
            Some(bag) => bag.dispose_reverse_async().await,
            None => Ok(()),
        }
    }
}

fn dispose_now(disposal: Disposable) {
    if let Err(failure) = disposal.dispose() {
        tracing::warn!(service = failure.service, error = %failure.message, "disposal failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::erase;
    use crate::key::Key;
    use crate::traits::{Dispose, DisposeError};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct Counted {
        disposed: AtomicUsize,
    }

    impl Dispose for Counted {
        fn dispose(&self) -> Result<(), DisposeError> {
            self.disposed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn constructed(value: &Arc<Counted>) -> Constructed {
        Constructed {
            value: erase(value.clone()),
            disposal: Some(Disposable::sync(value)),
        }
    }

    fn key() -> CacheKey {
        CacheKey::new(Key::of::<Counted>(), 0)
    }

    #[test]
    fn racing_first_constructions_run_once() {
        let store = ServiceStore::new();
        let built = AtomicUsize::new(0);
        let barrier = std::sync::Barrier::new(4);

        let values: Vec<AnyArc> = crossbeam_utils::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|_| {
                        barrier.wait();
                        store
                            .get_or_construct(key(), || {
                                built.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(20));
                                Ok(constructed(&Arc::new(Counted::default())))
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|value| Arc::ptr_eq(value, &values[0])));
        assert_eq!(store.pending_disposables(), 1);
    }

    #[test]
    fn failed_construction_leaves_the_entry_empty() {
        let store = ServiceStore::new();
        let failed = store.get_or_construct(key(), || Err(DiError::NotFound("Counted")));
        assert!(matches!(failed, Err(DiError::NotFound(_))));
        assert!(store.get(&key()).is_none());

        let value = Arc::new(Counted::default());
        let cached = store.get_or_construct(key(), || Ok(constructed(&value))).unwrap();
        assert!(Arc::ptr_eq(&cached, &store.get(&key()).unwrap()));
    }

    #[test]
    fn reentering_an_entry_under_construction_is_circular() {
        let store = ServiceStore::new();
        let result = store.get_or_construct(key(), || {
            store.get_or_construct(key(), || Ok(Constructed::untracked(erase(Arc::new(0u8)))))?;
            Ok(Constructed::untracked(erase(Arc::new(1u8))))
        });

        assert!(matches!(result, Err(DiError::Circular(_))));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let store = ServiceStore::new();
        let value = Arc::new(Counted::default());
        store.track(constructed(&value)).unwrap();

        store.dispose().unwrap();
        store.dispose().unwrap();

        assert!(store.is_disposed());
        assert_eq!(value.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capture_after_dispose_disposes_immediately() {
        let store = ServiceStore::new();
        store.dispose().unwrap();

        let late = Arc::new(Counted::default());
        assert!(matches!(store.track(constructed(&late)), Err(DiError::ScopeDisposed)));
        assert_eq!(late.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn construction_runs_outside_the_lock() {
        let store = ServiceStore::new();
        let value = store
            .get_or_construct(key(), || {
                // reentrant access to the same store must not deadlock
                assert!(store.get(&key()).is_none());
                Ok(Constructed::untracked(erase(Arc::new(Counted::default()))))
            })
            .unwrap();

        assert!(Arc::ptr_eq(&value, &store.get(&key()).unwrap()));
        assert_eq!(store.len(), 1);
    }
}
