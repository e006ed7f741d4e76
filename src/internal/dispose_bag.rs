//! Internal disposal bag for tracked disposables.

use crate::error::{DiError, DiResult, DisposalFailure};
use crate::traits::Disposable;

/// Disposables in construction order, torn down LIFO.
///
/// Teardown never stops at the first failure; every entry is attempted and
/// the failures are reported together.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Disposable>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, disposable: Disposable) {
        self.entries.push(disposable);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Dispose every entry synchronously, most recent first.
    pub(crate) fn dispose_reverse(mut self) -> DiResult<()> {
        let mut failures = Vec::new();
        while let Some(entry) = self.entries.pop() {
            if let Err(failure) = entry.dispose() {
                record(&mut failures, failure);
            }
        }
        finish(failures)
    }

    /// Dispose every entry, awaiting async disposal where supported.
    pub(crate) async fn dispose_reverse_async(mut self) -> DiResult<()> {
        let mut failures = Vec::new();
        while let Some(entry) = self.entries.pop() {
            if let Err(failure) = entry.dispose_async().await {
                record(&mut failures, failure);
            }
        }
        finish(failures)
    }
}

fn record(failures: &mut Vec<DisposalFailure>, failure: DisposalFailure) {
    tracing::warn!(service = failure.service, error = %failure.message, "disposal failed");
    failures.push(failure);
}

fn finish(failures: Vec<DisposalFailure>) -> DiResult<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(DiError::Disposal(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Dispose, DisposeError};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Tracked {
        id: usize,
        fail: bool,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl Dispose for Tracked {
        fn dispose(&self) -> Result<(), DisposeError> {
            self.log.lock().push(self.id);
            if self.fail {
                Err(format!("tracked {} failed", self.id).into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn disposes_in_reverse_and_collects_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        for id in 0..4 {
            let tracked = Arc::new(Tracked {
                id,
                fail: id % 2 == 1,
                log: log.clone(),
            });
            bag.push(Disposable::sync(&tracked));
        }
        assert_eq!(bag.len(), 4);

        match bag.dispose_reverse() {
            Err(DiError::Disposal(failures)) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].message, "tracked 3 failed");
                assert_eq!(failures[1].message, "tracked 1 failed");
            }
            other => panic!("expected disposal error, got {:?}", other),
        }
        assert_eq!(*log.lock(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn empty_bag_disposes_cleanly() {
        let bag = DisposeBag::default();
        assert_eq!(bag.len(), 0);
        assert!(bag.dispose_reverse().is_ok());
    }
}
