//! Scheduling of adaptive promotion builds.

use std::sync::Arc;
use std::thread;

use super::ServiceAccessor;

const PROMOTION_THREAD: &str = "ferrous-resolve-promote";

/// Run `accessor`'s promotion per its policy: on a named background thread,
/// or inline when background builds are disabled or the thread cannot start.
pub(super) fn schedule(accessor: Arc<ServiceAccessor>) {
    if !accessor.options.promotion.background {
        accessor.promote();
        return;
    }

    let worker = accessor.clone();
    let spawned = thread::Builder::new()
        .name(PROMOTION_THREAD.to_string())
        .spawn(move || worker.promote());

    if let Err(error) = spawned {
        tracing::warn!(
            service = accessor.key().display_name(),
            %error,
            "could not start promotion thread, promoting inline"
        );
        accessor.promote();
    }
}
