//! Finalization registries.
//!
//! A [`FinalizationRegistry`] is a weak-reference table plus a finalizer queue.
//! Registering an object stores a [`Probe`] that can tell whether the object
//! has been reclaimed without keeping it alive. Each [`collect`](crate::collect)
//! sweeps the table, queues the keys of reclaimed objects and delivers them to
//! the registry's event callback.

use std::fmt;
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;

use crate::error::{CallbackResult, Error};
use crate::key::Key;
use crate::retained::RetainedRegistries;

/// Reports whether a watched object has been reclaimed.
///
/// A probe must not keep its object alive.
pub trait Probe: Send + Sync {
    /// Returns `true` once the watched object has been reclaimed.
    fn is_reclaimed(&self) -> bool;
}

impl<T: ?Sized + Send + Sync> Probe for std::sync::Weak<T> {
    fn is_reclaimed(&self) -> bool {
        self.strong_count() == 0
    }
}

/// An object whose reclamation can be watched.
///
/// Implemented for `Arc<T>`. Types with their own handle scheme implement it
/// by returning a probe backed by a weak handle.
pub trait Reclaimable {
    /// Creates a probe for this object.
    fn probe(&self) -> Box<dyn Probe>;
}

impl<T: ?Sized + Send + Sync + 'static> Reclaimable for Arc<T> {
    fn probe(&self) -> Box<dyn Probe> {
        Box::new(Arc::downgrade(self))
    }
}

type EventHandler = Box<dyn FnMut(&Key) -> CallbackResult + Send>;
type ErrorHandler = Box<dyn Fn(Error) + Send + Sync>;

struct Entry {
    key: Key,
    probe: Box<dyn Probe>,
}

struct Handlers {
    on_event: EventHandler,
    on_error: ErrorHandler,
}

/// Outcome of delivering a registry's queued notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub delivered: usize,
    pub failures: usize,
}

/// Shared state of a registry. Owned by the process-wide retained list.
pub(crate) struct RegistryCore {
    entries: Mutex<Vec<Entry>>,
    queue: SegQueue<Key>,
    handlers: Mutex<Handlers>,
}

impl RegistryCore {
    /// Moves the keys of reclaimed objects onto the finalizer queue.
    ///
    /// Returns the number of keys queued.
    pub(crate) fn sweep(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| {
            if entry.probe.is_reclaimed() {
                self.queue.push(entry.key.clone());
                false
            } else {
                true
            }
        });
        before - entries.len()
    }

    /// Delivers queued keys to the event callback.
    ///
    /// If the handlers are busy (a callback re-entered `collect`, or another
    /// thread is delivering), the keys stay queued. A thread that delivers
    /// re-checks the queue after releasing the handlers, so a key pushed by
    /// a thread that found them busy is never left behind.
    pub(crate) fn deliver(&self) -> Delivery {
        let mut delivery = Delivery::default();
        while !self.queue.is_empty() {
            let Some(mut handlers) = self.handlers.try_lock() else {
                return delivery;
            };
            while let Some(key) = self.queue.pop() {
                delivery.delivered += 1;
                if Self::dispatch(&mut handlers, key) {
                    delivery.failures += 1;
                }
            }
        }
        delivery
    }

    /// Runs the event callback for `key`, routing failures to `on_error`.
    ///
    /// Returns whether the callback failed.
    fn dispatch(handlers: &mut Handlers, key: Key) -> bool {
        crate::tracing::internal::log_delivered(key.as_str());

        let failure = match crate::panic::catch(|| (handlers.on_event)(&key)) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(Error::callback(key, e)),
            Err(message) => Some(Error::CallbackPanicked { key, message }),
        };
        let Some(error) = failure else {
            return false;
        };

        crate::tracing::internal::log_callback_failure(&error);
        let on_error = &handlers.on_error;
        if let Err(message) = crate::panic::catch(|| on_error(error)) {
            crate::tracing::internal::log_callback_failure(&Error::BodyPanicked(message));
        }
        true
    }

    fn pending_len(&self) -> usize {
        self.entries.lock().len() + self.queue.len()
    }
}

/// Watches objects and reports their reclamation by key.
///
/// The registry is constructed with two callbacks:
///
/// - `on_event(key)` runs once for every registered object that has been
///   reclaimed, during the [`collect`](crate::collect) call that notices it;
/// - `on_error(err)` receives every failure raised by `on_event`, whether it
///   returned `Err` or panicked. Failures never propagate into the caller of
///   `collect`.
///
/// Every registry is retained by [`RetainedRegistries`] for the rest of the
/// process, so dropping a `FinalizationRegistry` handle never cancels pending
/// notifications.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use reclaim::{collect, ExpectedKeys, FinalizationRegistry};
///
/// let expected = ExpectedKeys::new(["buffer"]).unwrap();
/// let tracker = expected.clone();
/// let registry = FinalizationRegistry::new(
///     move |key| {
///         tracker.observe(key);
///         Ok(())
///     },
///     |err| panic!("{err}"),
/// );
///
/// let buffer = Arc::new(vec![0u8; 16]);
/// registry.register(&buffer, "buffer");
/// drop(buffer);
///
/// collect();
/// assert!(expected.is_drained());
/// ```
#[derive(Clone)]
pub struct FinalizationRegistry {
    core: Arc<RegistryCore>,
}

impl FinalizationRegistry {
    /// Creates a registry and retains it for the rest of the process.
    pub fn new<E, R>(on_event: E, on_error: R) -> Self
    where
        E: FnMut(&Key) -> CallbackResult + Send + 'static,
        R: Fn(Error) + Send + Sync + 'static,
    {
        let core = Arc::new(RegistryCore {
            entries: Mutex::new(Vec::new()),
            queue: SegQueue::new(),
            handlers: Mutex::new(Handlers {
                on_event: Box::new(on_event),
                on_error: Box::new(on_error),
            }),
        });
        RetainedRegistries::global().retain(Arc::clone(&core));

        Self { core }
    }

    /// Watches `target` and reports `key` once it has been reclaimed.
    ///
    /// The registry only keeps a weak probe; it never extends the lifetime of
    /// `target`. The same object may be registered under several keys.
    pub fn register(&self, target: &impl Reclaimable, key: impl Into<Key>) {
        let entry = Entry {
            key: key.into(),
            probe: target.probe(),
        };
        self.core.entries.lock().push(entry);
    }

    /// Stops watching every object registered under `key`.
    ///
    /// Returns the number of registrations removed. Keys already queued for
    /// delivery are not affected.
    pub fn unregister(&self, key: impl AsRef<str>) -> usize {
        let key = key.as_ref();
        let mut entries = self.core.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.key != *key);
        before - entries.len()
    }

    /// Returns the number of registrations not yet delivered.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.core.pending_len()
    }

    #[cfg(test)]
    pub(crate) fn core_for_test(&self) -> Arc<RegistryCore> {
        Arc::clone(&self.core)
    }
}

impl fmt::Debug for FinalizationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizationRegistry")
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording() -> (FinalizationRegistry, Arc<Mutex<Vec<Key>>>, Arc<Mutex<Vec<Error>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let (ev, er) = (Arc::clone(&events), Arc::clone(&errors));
        let registry = FinalizationRegistry::new(
            move |key| {
                ev.lock().push(key.clone());
                Ok(())
            },
            move |err| er.lock().push(err),
        );
        (registry, events, errors)
    }

    #[test]
    fn test_sweep_only_queues_reclaimed() {
        let (registry, events, _) = recording();
        let kept = Arc::new(1);
        let dropped = Arc::new(2);
        registry.register(&kept, "kept");
        registry.register(&dropped, "dropped");
        drop(dropped);

        let core = registry.core_for_test();
        assert_eq!(core.sweep(), 1);
        assert!(events.lock().is_empty(), "nothing delivered before deliver()");

        let delivery = core.deliver();
        assert_eq!(delivery.delivered, 1);
        assert_eq!(*events.lock(), vec![Key::from("dropped")]);
        assert_eq!(registry.pending_len(), 1);
    }

    #[test]
    fn test_each_key_delivered_once() {
        let (registry, events, _) = recording();
        let obj = Arc::new(());
        registry.register(&obj, "obj");
        drop(obj);

        let core = registry.core_for_test();
        core.sweep();
        core.deliver();
        core.sweep();
        core.deliver();
        assert_eq!(events.lock().len(), 1);
        assert_eq!(registry.pending_len(), 0);
    }

    #[test]
    fn test_panic_rerouted_to_on_error() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let er = Arc::clone(&errors);
        let registry = FinalizationRegistry::new(
            |key| {
                assert_eq!(key.as_str(), "something else");
                Ok(())
            },
            move |err| er.lock().push(err),
        );
        let obj = Arc::new(0u8);
        registry.register(&obj, "obj");
        drop(obj);

        let core = registry.core_for_test();
        core.sweep();
        let delivery = core.deliver();
        assert_eq!(delivery.failures, 1);

        let errors = errors.lock();
        assert!(matches!(
            &errors[..],
            [Error::CallbackPanicked { key, .. }] if key == "obj"
        ));
    }

    #[test]
    fn test_returned_error_rerouted_to_on_error() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let er = Arc::clone(&errors);
        let registry =
            FinalizationRegistry::new(|_key| Err("nope".into()), move |err| er.lock().push(err));
        let obj = Arc::new(0u8);
        registry.register(&obj, "obj");
        drop(obj);

        let core = registry.core_for_test();
        core.sweep();
        core.deliver();
        assert_eq!(
            errors.lock()[0].to_string(),
            "finalization callback for `obj` failed: nope"
        );
    }

    #[test]
    fn test_panicking_error_handler_is_contained() {
        let registry = FinalizationRegistry::new(|_key| Err("first".into()), |_err| panic!("second"));
        let obj = Arc::new(0u8);
        registry.register(&obj, "obj");
        drop(obj);

        let core = registry.core_for_test();
        core.sweep();
        assert_eq!(core.deliver().failures, 1);
    }

    #[test]
    fn test_unregister() {
        let (registry, events, _) = recording();
        let a = Arc::new(0u8);
        let b = Arc::new(0u8);
        registry.register(&a, "a");
        registry.register(&b, "b");
        registry.register(&b, "a");
        assert_eq!(registry.unregister("a"), 2);
        drop(a);
        drop(b);

        let core = registry.core_for_test();
        core.sweep();
        core.deliver();
        assert_eq!(*events.lock(), vec![Key::from("b")]);
    }

    #[test]
    fn test_registry_does_not_keep_target_alive() {
        let (registry, _, _) = recording();
        let obj = Arc::new(String::from("watched"));
        registry.register(&obj, "obj");
        assert_eq!(Arc::strong_count(&obj), 1);
        assert_eq!(Arc::weak_count(&obj), 1);
    }

    #[test]
    fn test_reentrant_delivery_keeps_keys_queued() {
        let calls = Arc::new(AtomicUsize::new(0));
        let core_slot: Arc<Mutex<Option<Arc<RegistryCore>>>> = Arc::new(Mutex::new(None));
        let (c, slot) = (Arc::clone(&calls), Arc::clone(&core_slot));
        let registry = FinalizationRegistry::new(
            move |_key| {
                c.fetch_add(1, Ordering::SeqCst);
                let core = slot.lock().clone();
                if let Some(core) = core {
                    // Handlers are busy; this must not deadlock or deliver.
                    assert_eq!(core.deliver().delivered, 0);
                }
                Ok(())
            },
            |err| panic!("{err}"),
        );
        *core_slot.lock() = Some(registry.core_for_test());

        let a = Arc::new(0u8);
        registry.register(&a, "a");
        drop(a);
        let b = Arc::new(0u8);
        registry.register(&b, "b");

        let core = registry.core_for_test();
        core.sweep();
        drop(b);
        core.sweep();
        // Both keys are queued before delivery; the callback re-enters once per key.
        core.deliver();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_delivery_leaves_nothing_queued() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 250;

        let (registry, events, _) = recording();
        let objects: Vec<Vec<Arc<usize>>> = (0..THREADS)
            .map(|t| {
                (0..PER_THREAD)
                    .map(|i| {
                        let obj = Arc::new(t * PER_THREAD + i);
                        registry.register(&obj, format!("obj{obj}"));
                        obj
                    })
                    .collect()
            })
            .collect();

        let core = registry.core_for_test();
        std::thread::scope(|scope| {
            for batch in objects {
                let core = &core;
                scope.spawn(move || {
                    for obj in batch {
                        drop(obj);
                        core.sweep();
                        core.deliver();
                    }
                });
            }
        });

        // No further delivery: whoever held the handlers drained the rest.
        assert_eq!(events.lock().len(), THREADS * PER_THREAD);
        assert_eq!(registry.pending_len(), 0);
    }
}
