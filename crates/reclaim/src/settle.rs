//! Single-settlement completion handle.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{CallbackResult, Error, Result};
use crate::key::Key;
use crate::registry::FinalizationRegistry;
use crate::tracker::ExpectedKeys;

/// The resolve/reject pair handed to a scenario body.
///
/// A scenario completes through an out-of-band event, typically a
/// finalization callback, rather than by its body returning. `Settle` is
/// cloneable and `Send`, so it can be moved into such callbacks. The first
/// call to [`resolve`](Self::resolve) or [`reject`](Self::reject) settles the
/// scenario; every later call is a no-op. If every clone is dropped before
/// the scenario settles, the scenario fails with [`Error::Abandoned`].
#[derive(Clone)]
pub struct Settle {
    inner: Arc<Inner>,
}

type Trackers = Arc<Mutex<Vec<ExpectedKeys>>>;

struct Inner {
    sender: Mutex<Option<oneshot::Sender<Result<()>>>>,
    trackers: Trackers,
}

pub(crate) type Settlement = oneshot::Receiver<Result<()>>;

/// The runner's view of a scenario's settle handles.
///
/// Holds no strong reference, so dropping the last [`Settle`] closes the
/// [`Settlement`].
pub(crate) struct Monitor {
    inner: Weak<Inner>,
    trackers: Trackers,
}

impl Monitor {
    /// Rejects through a live handle. Returns `false` if none is left or the
    /// scenario was already settled.
    pub(crate) fn reject(&self, error: Error) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| Settle { inner }.reject(error))
    }

    pub(crate) fn pending_keys(&self) -> Vec<Key> {
        pending_in(&self.trackers)
    }
}

fn pending_in(trackers: &Trackers) -> Vec<Key> {
    let trackers = trackers.lock().clone();
    let mut pending: Vec<Key> = trackers.iter().flat_map(ExpectedKeys::pending).collect();
    pending.sort();
    pending.dedup();
    pending
}

impl Settle {
    pub(crate) fn pair() -> (Self, Settlement) {
        let (tx, rx) = oneshot::channel();
        let settle = Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(tx)),
                trackers: Arc::default(),
            }),
        };
        (settle, rx)
    }

    pub(crate) fn monitor(&self) -> Monitor {
        Monitor {
            inner: Arc::downgrade(&self.inner),
            trackers: Arc::clone(&self.inner.trackers),
        }
    }

    fn settle(&self, outcome: Result<()>) -> bool {
        let Some(tx) = self.inner.sender.lock().take() else {
            crate::tracing::internal::log_late_settlement();
            return false;
        };
        tx.send(outcome).is_ok()
    }

    /// Settles the scenario as passed.
    ///
    /// Returns `true` if this call settled the scenario.
    pub fn resolve(&self) -> bool {
        self.settle(Ok(()))
    }

    /// Settles the scenario as failed.
    ///
    /// Returns `true` if this call settled the scenario.
    pub fn reject(&self, error: impl Into<Error>) -> bool {
        self.settle(Err(error.into()))
    }

    /// Returns whether the scenario has already been settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.sender.lock().is_none()
    }

    /// Creates a tracker for `keys` whose pending keys are reported if the
    /// scenario times out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoExpectedKeys`] when `keys` is empty.
    pub fn expect<I, K>(&self, keys: I) -> Result<ExpectedKeys>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let expected = ExpectedKeys::new(keys)?;
        self.inner.trackers.lock().push(expected.clone());
        Ok(expected)
    }

    /// Keys still pending on every tracker created through [`expect`](Self::expect).
    #[must_use]
    pub fn pending_keys(&self) -> Vec<Key> {
        pending_in(&self.inner.trackers)
    }

    /// Builds a registry wired to this scenario.
    ///
    /// For every delivered key, `check` runs first; it may assert on state
    /// captured by the closure. Then the key is observed on `expected`, and
    /// the scenario resolves when `expected` drains. Failures of `check`
    /// reject the scenario.
    pub fn registry<F>(&self, expected: ExpectedKeys, mut check: F) -> FinalizationRegistry
    where
        F: FnMut(&Key) -> CallbackResult + Send + 'static,
    {
        let resolve = self.clone();
        let reject = self.clone();
        FinalizationRegistry::new(
            move |key| {
                check(key)?;
                if expected.observe(key) {
                    resolve.resolve();
                }
                Ok(())
            },
            move |error| {
                reject.reject(error);
            },
        )
    }

    /// Runs `f`, rejecting the scenario if it panics.
    ///
    /// Use this around assertions in callbacks the harness does not wrap
    /// itself, such as subscription observers running on spawned tasks.
    pub fn run_checked<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        match crate::panic::catch(f) {
            Ok(value) => Some(value),
            Err(message) => {
                self.reject(Error::BodyPanicked(message));
                None
            }
        }
    }
}

impl fmt::Debug for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settle")
            .field("settled", &self.is_settled())
            .field("pending", &self.pending_keys())
            .finish()
    }
}
