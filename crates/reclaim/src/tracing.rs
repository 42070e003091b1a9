//! Harness tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! tracing spans and events for collections, notification delivery and
//! scenario state transitions. Without the feature every hook is a no-op.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use tracing::{span, Level};

    use crate::error::Error;
    use crate::runner::ScenarioState;

    /// Stable identifier for a collection.
    ///
    /// Used to correlate all notifications delivered by a single
    /// [`collect`](crate::collect) call. Monotonically increasing, starting
    /// at 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CollectId(pub u64);

    /// Global counter for generating unique collection IDs.
    static NEXT_COLLECT_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate the next unique collection ID.
    pub fn next_collect_id() -> CollectId {
        CollectId(NEXT_COLLECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a span for a whole collection.
    pub fn trace_collection(collect_id: CollectId, registries: usize) -> span::EnteredSpan {
        span!(
            Level::TRACE,
            "reclaim_collect",
            collect_id = collect_id.0,
            registries
        )
        .entered()
    }

    /// Create a span for a scenario run.
    pub fn trace_scenario(name: &str) -> span::Span {
        span!(Level::DEBUG, "reclaim_scenario", scenario = name)
    }

    pub fn log_delivered(key: &str) {
        tracing::debug!(key, "reclaimed");
    }

    pub fn log_unexpected_key(key: &str) {
        tracing::trace!(key, "ignoring key that is not pending");
    }

    pub fn log_callback_failure(error: &Error) {
        tracing::warn!(%error, "finalization callback failed");
    }

    pub fn log_registry_retained(total: usize) {
        tracing::trace!(total, "registry retained");
    }

    pub fn log_driver_stopped(ticks: u64, cancelled: bool) {
        tracing::debug!(ticks, cancelled, "collection driver stopped");
    }

    pub fn log_driver_failed(reason: &str) {
        tracing::error!(reason, "collection driver task failed");
    }

    pub fn log_transition(from: ScenarioState, to: ScenarioState) {
        tracing::debug!(from = ?from, to = ?to, "scenario state");
    }

    pub fn log_late_settlement() {
        tracing::trace!("scenario already settled, ignoring");
    }

    pub fn log_succeeded(elapsed: Duration, collections: u64) {
        tracing::info!(?elapsed, collections, "scenario passed");
    }

    pub fn log_failed(error: &Error) {
        if error.is_timeout() {
            tracing::error!(%error, "scenario timed out");
        } else {
            tracing::warn!(%error, "scenario failed");
        }
    }
}

#[cfg(not(feature = "tracing"))]
#[allow(clippy::missing_const_for_fn)]
pub mod internal {
    use std::time::Duration;

    use crate::error::Error;
    use crate::runner::ScenarioState;

    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CollectId(pub u64);

    /// Stub span guard when tracing is disabled.
    pub struct NoSpan;

    impl NoSpan {
        pub fn in_scope<F: FnOnce() -> R, R>(&self, f: F) -> R {
            f()
        }
    }

    pub fn next_collect_id() -> CollectId {
        CollectId(0)
    }

    pub fn trace_collection(_collect_id: CollectId, _registries: usize) -> NoSpan {
        NoSpan
    }

    pub fn trace_scenario(_name: &str) -> NoSpan {
        NoSpan
    }

    pub fn log_delivered(_key: &str) {}

    pub fn log_unexpected_key(_key: &str) {}

    pub fn log_callback_failure(_error: &Error) {}

    pub fn log_registry_retained(_total: usize) {}

    pub fn log_driver_stopped(_ticks: u64, _cancelled: bool) {}

    pub fn log_driver_failed(_reason: &str) {}

    pub fn log_transition(_from: ScenarioState, _to: ScenarioState) {}

    pub fn log_late_settlement() {}

    pub fn log_succeeded(_elapsed: Duration, _collections: u64) {}

    pub fn log_failed(_error: &Error) {}
}
