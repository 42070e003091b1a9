//! Forced collection.

use crate::retained::RetainedRegistries;

/// Statistics about a single collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectInfo {
    /// Number of registries swept.
    pub registries_swept: usize,
    /// Number of watched objects found reclaimed by this collection.
    pub reclaimed: usize,
    /// Number of notifications delivered to event callbacks.
    pub delivered: usize,
    /// Number of event callbacks that failed.
    pub failures: usize,
}

/// Force an immediate collection.
///
/// Sweeps every retained [`FinalizationRegistry`](crate::FinalizationRegistry)
/// and delivers a notification for each watched object that has been
/// reclaimed since the previous sweep. Callback failures are routed to the
/// owning registry's error handler and never reach the caller.
///
/// Notifications that cannot be delivered right now (the registry is already
/// delivering, for instance when a callback calls `collect` itself) stay
/// queued for the next collection.
pub fn collect() -> CollectInfo {
    let registries = RetainedRegistries::global().snapshot();
    let collect_id = crate::tracing::internal::next_collect_id();
    let _span = crate::tracing::internal::trace_collection(collect_id, registries.len());

    let mut info = CollectInfo {
        registries_swept: registries.len(),
        ..CollectInfo::default()
    };

    // Every registry is swept before any callback runs.
    for registry in &registries {
        info.reclaimed += registry.sweep();
    }
    for registry in &registries {
        let delivery = registry.deliver();
        info.delivered += delivery.delivered;
        info.failures += delivery.failures;
    }

    crate::metrics::record_collection(info.reclaimed, info.delivered, info.failures);
    info
}
