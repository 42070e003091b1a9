//! Query bookkeeping for a client.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::Cache;
use crate::observable::ObservableQuery;
use crate::query::Query;
use crate::value::QueryResult;

/// Identifies a tracked query within one client. Ids start at 1.
pub type QueryId = u64;

/// State kept for one watched query.
///
/// The manager owns every `QueryInfo` it tracks, and each info owns its
/// [`ObservableQuery`] until the query is torn down.
pub struct QueryInfo {
    id: QueryId,
    query: Query,
    last_result: Mutex<Option<QueryResult>>,
    observable: Mutex<Option<Arc<ObservableQuery>>>,
}

impl QueryInfo {
    /// Returns the query id.
    #[must_use]
    pub const fn id(&self) -> QueryId {
        self.id
    }

    /// Returns the query document.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Returns the last result delivered to observers.
    #[must_use]
    pub fn last_result(&self) -> Option<QueryResult> {
        self.last_result.lock().clone()
    }

    /// Returns whether the info still owns its observable query.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.observable.lock().is_some()
    }

    /// Stores `result`, returning `false` if it equals the previous one.
    pub(crate) fn update_result(&self, result: &QueryResult) -> bool {
        let mut last = self.last_result.lock();
        if last.as_ref() == Some(result) {
            return false;
        }
        *last = Some(result.clone());
        true
    }

    pub(crate) fn attach(&self, observable: Arc<ObservableQuery>) {
        *self.observable.lock() = Some(observable);
    }

    pub(crate) fn detach(&self) -> Option<Arc<ObservableQuery>> {
        self.observable.lock().take()
    }
}

impl fmt::Debug for QueryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryInfo")
            .field("id", &self.id)
            .field("query", &self.query.name())
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

/// Tracks the queries watched through a client.
pub struct QueryManager {
    cache: Arc<Cache>,
    queries: Mutex<BTreeMap<QueryId, Arc<QueryInfo>>>,
    next_id: AtomicU64,
}

impl QueryManager {
    pub(crate) fn new(cache: Arc<Cache>) -> Arc<Self> {
        Arc::new(Self {
            cache,
            queries: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the cache queries are evaluated against.
    #[must_use]
    pub const fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Returns the tracked queries ordered by id.
    #[must_use]
    pub fn queries(&self) -> Vec<Arc<QueryInfo>> {
        self.queries.lock().values().cloned().collect()
    }

    /// Returns the number of tracked queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.lock().len()
    }

    /// Returns whether no query is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.lock().is_empty()
    }

    pub(crate) fn track(&self, query: Query) -> Arc<QueryInfo> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = Arc::new(QueryInfo {
            id,
            query,
            last_result: Mutex::new(None),
            observable: Mutex::new(None),
        });
        self.queries.lock().insert(id, Arc::clone(&info));
        info
    }

    pub(crate) fn remove(&self, id: QueryId) -> Option<Arc<QueryInfo>> {
        self.queries.lock().remove(&id)
    }

    /// Tears down every tracked query and forgets it.
    pub(crate) fn stop(&self) {
        let queries = std::mem::take(&mut *self.queries.lock());
        tracing::debug!(queries = queries.len(), "stopping query manager");
        for info in queries.into_values() {
            if let Some(observable) = info.detach() {
                observable.tear_down();
            }
        }
        self.cache.clear_watches();
    }
}

impl fmt::Debug for QueryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryManager")
            .field("queries", &self.len())
            .finish_non_exhaustive()
    }
}
