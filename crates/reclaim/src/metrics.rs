//! Harness metrics and statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::retained::RetainedRegistries;

/// Process-wide counters, updated by every [`collect`](crate::collect).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarnessMetrics {
    /// Total collections since process start.
    pub total_collections: u64,
    /// Objects found reclaimed across all collections.
    pub total_reclaimed: u64,
    /// Notifications handed to event callbacks.
    pub total_delivered: u64,
    /// Event callbacks that panicked or returned an error.
    pub total_failures: u64,
    /// Registries retained for the process lifetime.
    pub registries_retained: usize,
}

static TOTAL_COLLECTIONS: AtomicU64 = AtomicU64::new(0);
static TOTAL_RECLAIMED: AtomicU64 = AtomicU64::new(0);
static TOTAL_DELIVERED: AtomicU64 = AtomicU64::new(0);
static TOTAL_FAILURES: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_collection(reclaimed: usize, delivered: usize, failures: usize) {
    TOTAL_COLLECTIONS.fetch_add(1, Ordering::Relaxed);
    TOTAL_RECLAIMED.fetch_add(reclaimed as u64, Ordering::Relaxed);
    TOTAL_DELIVERED.fetch_add(delivered as u64, Ordering::Relaxed);
    TOTAL_FAILURES.fetch_add(failures as u64, Ordering::Relaxed);
}

/// Returns a snapshot of the process-wide counters.
#[must_use]
pub fn harness_metrics() -> HarnessMetrics {
    HarnessMetrics {
        total_collections: TOTAL_COLLECTIONS.load(Ordering::Relaxed),
        total_reclaimed: TOTAL_RECLAIMED.load(Ordering::Relaxed),
        total_delivered: TOTAL_DELIVERED.load(Ordering::Relaxed),
        total_failures: TOTAL_FAILURES.load(Ordering::Relaxed),
        registries_retained: RetainedRegistries::global().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_collection_is_monotonic() {
        let before = harness_metrics();
        record_collection(2, 2, 1);
        let after = harness_metrics();
        assert!(after.total_collections > before.total_collections);
        assert!(after.total_reclaimed >= before.total_reclaimed + 2);
        assert!(after.total_failures > before.total_failures);
    }
}
