//! Watched queries and their subscriptions.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cache::Cache;
use crate::manager::{QueryInfo, QueryManager};
use crate::value::QueryResult;

/// Receives the current result of a watched query, then every change.
pub type Observer = Box<dyn FnMut(&QueryResult, &Subscription) + Send>;

type SubscriptionId = u64;
type SharedObserver = Arc<Mutex<Observer>>;

/// A query watching the cache.
///
/// While attached, the owning [`QueryManager`] keeps the query alive through
/// its [`QueryInfo`]. Tearing the query down (the last unsubscribe, or
/// stopping the client) releases that ownership and drops every observer.
pub struct ObservableQuery {
    info: Arc<QueryInfo>,
    cache: Arc<Cache>,
    manager: Weak<QueryManager>,
    observers: Mutex<Vec<(SubscriptionId, SharedObserver)>>,
    next_subscription: AtomicU64,
    torn_down: AtomicBool,
    self_ref: Weak<Self>,
}

impl ObservableQuery {
    pub(crate) fn new(
        info: Arc<QueryInfo>,
        cache: Arc<Cache>,
        manager: Weak<QueryManager>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            info,
            cache,
            manager,
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            torn_down: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    /// Returns the bookkeeping entry for this query.
    #[must_use]
    pub const fn info(&self) -> &Arc<QueryInfo> {
        &self.info
    }

    /// Reads the query from the cache.
    #[must_use]
    pub fn current_result(&self) -> QueryResult {
        self.cache.read(self.info.query())
    }

    /// Returns the number of active observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Returns whether the query was torn down.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Adds `observer`.
    ///
    /// The observer first receives the current result from a spawned task,
    /// never synchronously from this call.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe<F>(self: &Arc<Self>, observer: F) -> Subscription
    where
        F: FnMut(&QueryResult, &Subscription) + Send + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let observer: Observer = Box::new(observer);
        let observer = Arc::new(Mutex::new(observer));
        self.observers.lock().push((id, observer));
        self.cache.watch(self);

        let query = Arc::clone(self);
        tokio::spawn(async move {
            query.deliver_initial(id);
        });

        Subscription {
            query: Arc::downgrade(self),
            id,
        }
    }

    /// Removes one observer, tearing the query down when none remain.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        let remaining = {
            let mut observers = self.observers.lock();
            observers.retain(|(sid, _)| *sid != id);
            observers.len()
        };
        if remaining == 0 {
            self.tear_down();
        }
    }

    /// Re-reads the query and notifies every observer if the result changed.
    pub fn refresh(&self) {
        if self.is_torn_down() {
            return;
        }
        let result = self.current_result();
        if !self.info.update_result(&result) {
            return;
        }
        let observers: Vec<(SubscriptionId, SharedObserver)> = self.observers.lock().clone();
        for (id, observer) in observers {
            self.notify(id, &observer, &result);
        }
    }

    fn deliver_initial(&self, id: SubscriptionId) {
        if self.is_torn_down() {
            return;
        }
        let observer = self
            .observers
            .lock()
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, observer)| Arc::clone(observer));
        let Some(observer) = observer else {
            return;
        };
        let result = self.current_result();
        self.info.update_result(&result);
        self.notify(id, &observer, &result);
    }

    fn notify(&self, id: SubscriptionId, observer: &SharedObserver, result: &QueryResult) {
        let subscription = Subscription {
            query: self.self_ref.clone(),
            id,
        };
        // An observer already running further up this stack is skipped.
        if let Some(mut observer) = observer.try_lock() {
            (*observer)(result, &subscription);
        }
    }

    /// Stops watching the cache and releases the manager's ownership.
    pub(crate) fn tear_down(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::trace!(
            query = self.info.query().name(),
            id = self.info.id(),
            "tearing down query"
        );

        let observers = std::mem::take(&mut *self.observers.lock());
        self.cache.unwatch(self);
        if let Some(manager) = self.manager.upgrade() {
            manager.remove(self.info.id());
        }
        drop(self.info.detach());
        drop(observers);
    }
}

impl fmt::Debug for ObservableQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableQuery")
            .field("info", &self.info)
            .field("observers", &self.observer_count())
            .field("torn_down", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}

/// Handle to one observer of an [`ObservableQuery`].
///
/// Dropping a subscription does not unsubscribe, and the handle does not keep
/// the query alive.
#[derive(Clone)]
pub struct Subscription {
    query: Weak<ObservableQuery>,
    id: SubscriptionId,
}

impl Subscription {
    /// Removes the observer from its query, if the query is still alive.
    pub fn unsubscribe(&self) {
        if let Some(query) = self.query.upgrade() {
            query.unsubscribe(self.id);
        }
    }

    /// Returns the subscribed query, if it is still alive.
    #[must_use]
    pub fn query(&self) -> Option<Arc<ObservableQuery>> {
        self.query.upgrade()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &(self.query.strong_count() > 0))
            .finish()
    }
}
