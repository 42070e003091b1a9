//! A small observable query cache.
//!
//! `reclaim-cache` is the library whose teardown paths the `reclaim`
//! scenarios check. It models the ownership graph of a client-side query
//! cache: a [`Client`] owns a [`Cache`] and a [`QueryManager`], the manager
//! owns one [`QueryInfo`] per watched query, and each info owns its
//! [`ObservableQuery`] until the query is torn down.
//!
//! Everything that points back up that graph is weak: caches hold weak
//! references to their watchers, [`ReactiveVar`]s to the caches reading them
//! and [`Subscription`]s to their queries. Stopping a client or removing the
//! last observer of a query therefore releases the objects involved.
//!
//! # Example
//!
//! ```
//! use reclaim_cache::{Cache, Client, Query, ReactiveVar, TypePolicies, Value};
//!
//! let local = ReactiveVar::new(123);
//! let read = local.clone();
//! let cache = Cache::with_policies(
//!     TypePolicies::new().field("Query", "local", move || Value::from(read.get())),
//! );
//! let client = Client::new(cache);
//! let result = client.read_query(&Query::new("Local").field("local"));
//! assert_eq!(result.get("local"), Some(&Value::Int(123)));
//! ```

#![warn(missing_docs)]

mod cache;
mod client;
mod error;
mod manager;
mod observable;
mod prefetch;
mod query;
mod value;
mod var;

pub use cache::{Cache, FieldReader, TypePolicies, ROOT_TYPE};
pub use client::Client;
pub use error::{Error, Result};
pub use manager::{QueryId, QueryInfo, QueryManager};
pub use observable::{ObservableQuery, Observer, Subscription};
pub use prefetch::{prefetch, Prefetcher, RenderContext};
pub use query::Query;
pub use value::{QueryResult, Value};
pub use var::ReactiveVar;
