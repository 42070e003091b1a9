//! Reactive variables.
//!
//! A [`ReactiveVar`] is a value cell read synchronously by field policies. A
//! read performed while a cache is evaluating a query records a weak
//! dependency on that cache; [`ReactiveVar::set`] rebroadcasts every cache
//! still alive.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cache::Cache;

thread_local! {
    /// Caches currently evaluating a query on this thread, innermost last.
    static READING: RefCell<Vec<Weak<Cache>>> = const { RefCell::new(Vec::new()) };
}

struct ReadingGuard;

impl Drop for ReadingGuard {
    fn drop(&mut self) {
        READING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Runs `f` with `cache` marked as the cache being read.
pub(crate) fn with_reading<R>(cache: Weak<Cache>, f: impl FnOnce() -> R) -> R {
    READING.with(|stack| stack.borrow_mut().push(cache));
    let _guard = ReadingGuard;
    f()
}

fn current_reader() -> Option<Weak<Cache>> {
    READING.with(|stack| stack.borrow().last().cloned())
}

struct VarInner<T> {
    value: Mutex<T>,
    dependents: Mutex<Vec<Weak<Cache>>>,
}

/// A mutable value cell.
///
/// Cloning a `ReactiveVar` yields another handle to the same cell. The cell
/// only holds weak references to the caches that read it.
///
/// # Example
///
/// ```
/// use reclaim_cache::ReactiveVar;
///
/// let local = ReactiveVar::new(123);
/// assert_eq!(local.get(), 123);
/// local.set(124);
/// assert_eq!(local.get(), 124);
/// ```
pub struct ReactiveVar<T> {
    inner: Arc<VarInner<T>>,
}

impl<T> Clone for ReactiveVar<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> ReactiveVar<T> {
    /// Creates a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(VarInner {
                value: Mutex::new(value),
                dependents: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the current value.
    ///
    /// When called from a field policy, the cache being read becomes a
    /// dependent of this cell.
    pub fn get(&self) -> T {
        if let Some(reader) = current_reader() {
            let mut dependents = self.inner.dependents.lock();
            dependents.retain(|w| w.strong_count() > 0);
            if !dependents.iter().any(|w| w.ptr_eq(&reader)) {
                dependents.push(reader);
            }
        }
        self.inner.value.lock().clone()
    }

    /// Replaces the value and rebroadcasts dependent caches.
    pub fn set(&self, value: T) {
        *self.inner.value.lock() = value;

        let caches: Vec<Arc<Cache>> = self
            .inner
            .dependents
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for cache in caches {
            cache.broadcast_watches();
        }
    }

    /// Returns the number of live caches depending on this cell.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.inner
            .dependents
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveVar")
            .field("value", &*self.inner.value.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Query, TypePolicies, Value};

    #[test]
    fn test_get_outside_read_records_nothing() {
        let var = ReactiveVar::new(1);
        assert_eq!(var.get(), 1);
        assert_eq!(var.dependent_count(), 0);
    }

    #[test]
    fn test_read_records_weak_dependent() {
        let var = ReactiveVar::new(123);
        let policy_var = var.clone();
        let cache = Cache::with_policies(
            TypePolicies::new().field("Query", "local", move || Value::from(policy_var.get())),
        );

        let result = cache.read(&Query::new("Local").field("local"));
        assert_eq!(result.get("local"), Some(&Value::Int(123)));
        assert_eq!(var.dependent_count(), 1);

        // Reading again does not duplicate the dependency.
        cache.read(&Query::new("Local").field("local"));
        assert_eq!(var.dependent_count(), 1);

        // The var does not keep the cache alive.
        drop(cache);
        assert_eq!(var.dependent_count(), 0);
    }
}
