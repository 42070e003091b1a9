//! Expected-event tracking.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::key::Key;

/// The set of keys a scenario is still waiting for.
///
/// `ExpectedKeys` is a shared handle: clones observe and mutate the same set,
/// so one copy can live in a finalization callback while another is used for
/// diagnostics. Keys are only ever removed.
///
/// # Examples
///
/// ```
/// use reclaim::ExpectedKeys;
///
/// let expected = ExpectedKeys::new(["client.cache", "ObservableQuery"]).unwrap();
/// assert!(!expected.observe("ObservableQuery"));
/// assert!(!expected.observe("ObservableQuery")); // already removed
/// assert!(!expected.observe("unrelated"));       // ignored
/// assert!(expected.observe("client.cache"));     // drained
/// ```
#[derive(Clone)]
pub struct ExpectedKeys {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    pending: BTreeSet<Key>,
    observed: Vec<Key>,
    drained: bool,
}

impl ExpectedKeys {
    /// Creates a tracker waiting for every key in `keys`.
    ///
    /// Duplicate keys collapse into one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoExpectedKeys`] when `keys` is empty. An empty set
    /// is a configuration error, never an already-passed scenario.
    pub fn new<I, K>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let pending: BTreeSet<Key> = keys.into_iter().map(Into::into).collect();
        if pending.is_empty() {
            return Err(Error::NoExpectedKeys);
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                pending,
                observed: Vec::new(),
                drained: false,
            })),
        })
    }

    /// Records that `key` was reclaimed.
    ///
    /// Returns `true` only for the observation that empties the set. Keys that
    /// are not pending (never expected, or already observed) are ignored and
    /// return `false`.
    pub fn observe(&self, key: impl AsRef<str>) -> bool {
        let key = key.as_ref();
        let mut inner = self.inner.lock();
        let Some(key) = inner.pending.take(key) else {
            crate::tracing::internal::log_unexpected_key(key);
            return false;
        };
        inner.observed.push(key);

        if inner.pending.is_empty() && !inner.drained {
            inner.drained = true;
            return true;
        }
        false
    }

    /// Returns whether `key` is still pending.
    #[must_use]
    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.inner.lock().pending.contains(key.as_ref())
    }

    /// Returns the pending keys in sorted order.
    #[must_use]
    pub fn pending(&self) -> Vec<Key> {
        self.inner.lock().pending.iter().cloned().collect()
    }

    /// Returns the keys observed so far, in arrival order.
    #[must_use]
    pub fn observed(&self) -> Vec<Key> {
        self.inner.lock().observed.clone()
    }

    /// Returns the number of pending keys.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Returns whether every expected key has been observed.
    #[inline]
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.inner.lock().drained
    }
}

impl fmt::Debug for ExpectedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ExpectedKeys")
            .field("pending", &inner.pending)
            .field("observed", &inner.observed)
            .field("drained", &inner.drained)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_is_config_error() {
        let keys: [&str; 0] = [];
        assert!(matches!(ExpectedKeys::new(keys), Err(Error::NoExpectedKeys)));
    }

    #[test]
    fn test_duplicates_collapse() {
        let expected = ExpectedKeys::new(["a", "a", "b"]).unwrap();
        assert_eq!(expected.len(), 2);
    }

    #[test]
    fn test_drains_once_in_any_order() {
        let expected = ExpectedKeys::new(["a", "b", "c"]).unwrap();
        assert!(!expected.observe("c"));
        assert!(!expected.observe("a"));
        assert!(expected.observe("b"));
        assert!(expected.is_drained());

        // Nothing left to drain.
        assert!(!expected.observe("b"));
        assert!(!expected.observe("a"));
        assert_eq!(
            expected.observed(),
            vec![Key::from("c"), Key::from("a"), Key::from("b")]
        );
    }

    #[test]
    fn test_observe_is_idempotent() {
        let expected = ExpectedKeys::new(["a", "b"]).unwrap();
        assert!(!expected.observe("a"));
        assert!(!expected.observe("a"));
        assert_eq!(expected.len(), 1);
        assert_eq!(expected.pending(), vec![Key::from("b")]);
    }

    #[test]
    fn test_unexpected_key_ignored() {
        let expected = ExpectedKeys::new(["a"]).unwrap();
        assert!(!expected.observe("z"));
        assert!(expected.contains("a"));
        assert!(!expected.is_drained());
    }

    #[test]
    fn test_clones_share_state() {
        let expected = ExpectedKeys::new(["a"]).unwrap();
        let other = expected.clone();
        assert!(other.observe("a"));
        assert!(expected.is_drained());
        assert!(expected.pending().is_empty());
    }
}
