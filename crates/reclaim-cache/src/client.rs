//! The client facade.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::Cache;
use crate::manager::QueryManager;
use crate::observable::ObservableQuery;
use crate::query::Query;
use crate::value::QueryResult;

/// Owns a cache and the queries watched against it.
///
/// # Example
///
/// ```
/// use reclaim_cache::{Cache, Client, Query};
///
/// let client = Client::new(Cache::new());
/// client.cache().write("greeting", "hello");
/// let result = client.read_query(&Query::new("Greeting").field("greeting"));
/// assert_eq!(result.to_json(), r#"{"greeting":"hello"}"#);
/// ```
pub struct Client {
    cache: Arc<Cache>,
    manager: Arc<QueryManager>,
    stopped: AtomicBool,
}

impl Client {
    /// Creates a client over `cache`.
    #[must_use]
    pub fn new(cache: Arc<Cache>) -> Arc<Self> {
        let manager = QueryManager::new(Arc::clone(&cache));
        Arc::new(Self {
            cache,
            manager,
            stopped: AtomicBool::new(false),
        })
    }

    /// Returns the client's cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Returns the client's query manager.
    #[must_use]
    pub const fn query_manager(&self) -> &Arc<QueryManager> {
        &self.manager
    }

    /// Reads `query` once without watching it.
    #[must_use]
    pub fn read_query(&self, query: &Query) -> QueryResult {
        self.cache.read(query)
    }

    /// Starts watching `query`.
    ///
    /// The query manager owns the returned query until it is torn down.
    pub fn watch_query(&self, query: Query) -> Arc<ObservableQuery> {
        if self.is_stopped() {
            tracing::warn!(query = query.name(), "watching a query on a stopped client");
        }
        let info = self.manager.track(query);
        let observable = ObservableQuery::new(
            Arc::clone(&info),
            Arc::clone(&self.cache),
            Arc::downgrade(&self.manager),
        );
        info.attach(Arc::clone(&observable));
        self.cache.watch(&observable);
        tracing::trace!(id = info.id(), query = info.query().name(), "watching query");
        observable
    }

    /// Tears down every watched query and clears the cache's watches.
    ///
    /// Stopping twice is a no-op.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("stopping client");
        self.manager.stop();
    }

    /// Returns whether [`stop`](Self::stop) was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("cache", &self.cache)
            .field("manager", &self.manager)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
