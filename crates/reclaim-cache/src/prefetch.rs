//! Data gathering ahead of a render pass.
//!
//! [`prefetch`] watches a set of queries, collects their results and hands
//! them to a render function. The [`Prefetcher`] only tracks the watched
//! queries for the duration of the pass; it is cleared before `prefetch`
//! returns, so a prefetcher kept around afterwards keeps nothing alive.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::observable::ObservableQuery;
use crate::query::Query;
use crate::value::QueryResult;

/// Tracks the queries watched during one prefetch pass.
#[derive(Default)]
pub struct Prefetcher {
    queries: Mutex<Vec<Arc<ObservableQuery>>>,
    cleared: AtomicBool,
}

impl Prefetcher {
    /// Creates an empty prefetcher.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
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

    /// Returns whether [`clear`](Self::clear) was called.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.cleared.load(Ordering::Acquire)
    }

    /// Tracks `query` until the prefetcher is cleared.
    pub fn track(&self, query: Arc<ObservableQuery>) {
        self.queries.lock().push(query);
    }

    /// Forgets every tracked query.
    pub fn clear(&self) {
        let queries = std::mem::take(&mut *self.queries.lock());
        self.cleared.store(true, Ordering::Release);
        tracing::trace!(queries = queries.len(), "clearing prefetcher");
    }
}

impl fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prefetcher")
            .field("queries", &self.len())
            .field("cleared", &self.is_cleared())
            .finish()
    }
}

/// What a render function sees.
#[derive(Debug)]
pub struct RenderContext {
    client: Arc<Client>,
    prefetcher: Arc<Prefetcher>,
    results: BTreeMap<String, QueryResult>,
}

impl RenderContext {
    /// Returns the client the data came from.
    #[must_use]
    pub const fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Returns the prefetcher tracking this pass.
    #[must_use]
    pub const fn prefetcher(&self) -> &Arc<Prefetcher> {
        &self.prefetcher
    }

    /// Returns the result of the query called `name`.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&QueryResult> {
        self.results.get(name)
    }
}

/// Watches `queries` on `client`, then renders their results once.
///
/// The prefetcher is cleared after rendering. The watched queries stay
/// owned by the client's query manager until the client is stopped.
///
/// # Errors
///
/// Returns [`Error::Incomplete`] if the cache cannot produce every field of
/// a query.
///
/// # Example
///
/// ```
/// use reclaim_cache::{prefetch, Cache, Client, Query};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let client = Client::new(Cache::new());
/// let html = prefetch(&client, [Query::new("Root").field("__typename")], |cx| {
///     format!("<code>{}</code>", cx.result("Root").unwrap().to_json())
/// })
/// .await
/// .unwrap();
/// assert_eq!(html, r#"<code>{"__typename":"Query"}</code>"#);
/// client.stop();
/// # });
/// ```
pub async fn prefetch<I, R>(client: &Arc<Client>, queries: I, render: R) -> Result<String>
where
    I: IntoIterator<Item = Query>,
    R: FnOnce(&RenderContext) -> String + Send,
{
    let prefetcher = Prefetcher::new();
    let mut results = BTreeMap::new();
    for query in queries {
        let name = query.name().to_string();
        let observable = client.watch_query(query);
        prefetcher.track(Arc::clone(&observable));

        let result = observable.current_result();
        if !result.is_complete() {
            prefetcher.clear();
            return Err(Error::Incomplete {
                query: name,
                missing: result.missing,
            });
        }
        observable.info().update_result(&result);
        results.insert(name, result);
    }

    tokio::task::yield_now().await;

    let context = RenderContext {
        client: Arc::clone(client),
        prefetcher,
        results,
    };
    let html = render(&context);
    context.prefetcher.clear();
    tracing::debug!(queries = context.results.len(), "prefetch pass rendered");
    Ok(html)
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::Cache;

    #[tokio::test]
    async fn test_prefetch_clears_prefetcher() {
        let client = Client::new(Cache::new());
        let mut kept = None;
        let html = prefetch(&client, [Query::new("Root").field("__typename")], |cx| {
            assert_eq!(cx.prefetcher().len(), 1);
            kept = Some(Arc::clone(cx.prefetcher()));
            cx.result("Root").map(QueryResult::to_json).unwrap_or_default()
        })
        .await
        .unwrap();

        assert_eq!(html, r#"{"__typename":"Query"}"#);
        let kept = kept.unwrap();
        assert!(kept.is_cleared());
        assert!(kept.is_empty());
        // The query stays with the client until it stops.
        assert_eq!(client.query_manager().len(), 1);
    }

    #[tokio::test]
    async fn test_cleared_prefetcher_releases_queries() {
        let client = Client::new(Cache::new());
        let mut info = Weak::new();
        prefetch(&client, [Query::new("Root").field("__typename")], |cx| {
            info = Arc::downgrade(&cx.client().query_manager().queries()[0]);
            String::new()
        })
        .await
        .unwrap();

        assert!(info.upgrade().is_some());
        client.stop();
        assert!(info.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_incomplete_query_fails() {
        let client = Client::new(Cache::new());
        let error = prefetch(&client, [Query::new("Local").field("local")], |_| String::new())
            .await
            .unwrap_err();
        assert_eq!(
            error,
            Error::Incomplete {
                query: "Local".into(),
                missing: vec!["local".into()],
            }
        );
    }
}
