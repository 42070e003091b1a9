//! The normalized cache.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::observable::ObservableQuery;
use crate::query::Query;
use crate::value::{QueryResult, Value};
use crate::var::with_reading;

/// Type name of the root query object.
pub const ROOT_TYPE: &str = "Query";

/// Computes a field value on read.
pub type FieldReader = Arc<dyn Fn() -> Value + Send + Sync>;

/// Per-type field read functions.
#[derive(Clone, Default)]
pub struct TypePolicies {
    fields: BTreeMap<(String, String), FieldReader>,
}

impl TypePolicies {
    /// Creates an empty policy set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a read function for `type_name.field`.
    #[must_use]
    pub fn field<F>(mut self, type_name: &str, field: &str, read: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.fields
            .insert((type_name.to_string(), field.to_string()), Arc::new(read));
        self
    }

    fn reader(&self, type_name: &str, field: &str) -> Option<&FieldReader> {
        self.fields.get(&(type_name.to_string(), field.to_string()))
    }
}

impl fmt::Debug for TypePolicies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.fields.keys()).finish()
    }
}

/// Stores root field values and evaluates queries against them.
///
/// A cache keeps weak references to the queries watching it, so watching
/// never keeps a query alive.
pub struct Cache {
    policies: TypePolicies,
    store: Mutex<BTreeMap<String, Value>>,
    watches: Mutex<Vec<Weak<ObservableQuery>>>,
    self_ref: Weak<Self>,
}

impl Cache {
    /// Creates an empty cache without field policies.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_policies(TypePolicies::new())
    }

    /// Creates an empty cache using `policies` for field reads.
    #[must_use]
    pub fn with_policies(policies: TypePolicies) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            policies,
            store: Mutex::new(BTreeMap::new()),
            watches: Mutex::new(Vec::new()),
            self_ref: self_ref.clone(),
        })
    }

    /// Evaluates `query`.
    ///
    /// `__typename` resolves to the root type; other fields use the type
    /// policy when one exists, then the stored value. Fields with neither are
    /// reported as missing.
    #[must_use]
    pub fn read(&self, query: &Query) -> QueryResult {
        with_reading(self.self_ref.clone(), || {
            let mut result = QueryResult::default();
            for field in query.fields() {
                let value = if field == "__typename" {
                    Some(Value::from(ROOT_TYPE))
                } else if let Some(read) = self.policies.reader(ROOT_TYPE, field) {
                    Some(read())
                } else {
                    self.store.lock().get(field).cloned()
                };

                match value {
                    Some(value) => {
                        result.data.insert(field.clone(), value);
                    }
                    None => result.missing.push(field.clone()),
                }
            }
            result
        })
    }

    /// Stores a root field value and rebroadcasts watching queries.
    pub fn write(&self, field: &str, value: impl Into<Value>) {
        self.store.lock().insert(field.to_string(), value.into());
        self.broadcast_watches();
    }

    /// Re-evaluates every live watching query, delivering changed results.
    pub fn broadcast_watches(&self) {
        let live: Vec<Arc<ObservableQuery>> = {
            let mut watches = self.watches.lock();
            watches.retain(|w| w.strong_count() > 0);
            watches.iter().filter_map(Weak::upgrade).collect()
        };
        for query in live {
            query.refresh();
        }
    }

    /// Returns the number of live watching queries.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.watches
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub(crate) fn watch(&self, query: &Arc<ObservableQuery>) {
        let mut watches = self.watches.lock();
        let weak = Arc::downgrade(query);
        if !watches.iter().any(|w| w.ptr_eq(&weak)) {
            watches.push(weak);
        }
    }

    pub(crate) fn unwatch(&self, query: &ObservableQuery) {
        let ptr: *const ObservableQuery = query;
        self.watches.lock().retain(|w| !std::ptr::eq(w.as_ptr(), ptr));
    }

    pub(crate) fn clear_watches(&self) {
        self.watches.lock().clear();
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("policies", &self.policies)
            .field("fields", &self.store.lock().len())
            .field("watches", &self.watch_count())
            .finish()
    }
}
