//! Forced-collection driver.
//!
//! This module provides [`CollectionDriver`], a tokio task that calls
//! [`collect`](crate::collect) on every tick until its window closes or it is
//! cancelled. The driver uses the RAII pattern: dropping it cancels the task.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::collect::collect;
use crate::config::HarnessConfig;

/// A recurring forced collection bounded by a window.
///
/// The first collection happens as soon as the task is polled. After each
/// collection the driver reschedules itself one tick later, but only while
/// `now < start + max_window`. Running out of window does not fail anything;
/// deadlines belong to the [`Scenario`](crate::Scenario) runner.
///
/// # Panics
///
/// [`CollectionDriver::start`] panics when called outside of a tokio runtime.
///
/// # Example
///
/// ```ignore
/// let driver = CollectionDriver::start(&HarnessConfig::default());
/// // ... wait for notifications ...
/// drop(driver); // cancels the pending tick
/// ```
#[must_use = "dropping the driver cancels it"]
pub struct CollectionDriver {
    token: CancellationToken,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl CollectionDriver {
    /// Spawns the driver on the current tokio runtime.
    pub fn start(config: &HarnessConfig) -> Self {
        let token = CancellationToken::new();
        let ticks = Arc::new(AtomicU64::new(0));
        let deadline = Instant::now() + config.max_window;
        let period = config.tick;

        let task = tokio::spawn({
            let token = token.clone();
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    collect();
                    let n = ticks.fetch_add(1, Ordering::Relaxed) + 1;

                    if Instant::now() >= deadline {
                        crate::tracing::internal::log_driver_stopped(n, false);
                        return;
                    }

                    tokio::select! {
                        () = token.cancelled() => {
                            crate::tracing::internal::log_driver_stopped(n, true);
                            return;
                        }
                        () = time::sleep(period) => {}
                    }
                }
            }
        });

        Self {
            _guard: token.clone().drop_guard(),
            token,
            ticks,
            task,
        }
    }

    /// Cancels the pending tick. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns whether the driver was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns whether the driver task has exited, by cancellation or
    /// because its window closed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Returns the number of collections issued so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Waits until the driver task has exited.
    pub async fn join(self) {
        let Self {
            task,
            _guard: guard,
            ..
        } = self;
        // The guard must outlive the wait, or joining would cancel the driver.
        report_exit(task.await);
        drop(guard);
    }
}

/// Logs an abnormal exit of the driver task and returns its reason.
fn report_exit(joined: Result<(), JoinError>) -> Option<String> {
    let error = joined.err()?;
    let reason = if error.is_panic() {
        crate::panic::panic_message(error.into_panic().as_ref())
    } else {
        error.to_string()
    };
    crate::tracing::internal::log_driver_failed(&reason);
    Some(reason)
}

impl fmt::Debug for CollectionDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionDriver")
            .field("ticks", &self.ticks())
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}
