//! Process-level registry retention.
//!
//! This module provides [`RetainedRegistries`], a process-level singleton that
//! keeps every [`FinalizationRegistry`](crate::FinalizationRegistry) alive for
//! the rest of the process. A registry dropped before its watched objects are
//! reclaimed would silently lose its pending notifications, so registries are
//! appended here on construction and never removed.

use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::registry::RegistryCore;

/// Process-level, append-only list of finalization registries.
///
/// The list is empty at process start, grows by one entry per registry and
/// is discarded at process exit. It is also the set of registries a
/// [`collect`](crate::collect) call sweeps.
///
/// The singleton is initialized on first access via [`RetainedRegistries::global()`].
pub struct RetainedRegistries {
    registries: Mutex<Vec<Arc<RegistryCore>>>,
}

impl RetainedRegistries {
    /// Returns a reference to the global `RetainedRegistries` singleton.
    #[must_use]
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    const fn new() -> Self {
        Self {
            registries: Mutex::new(Vec::new()),
        }
    }

    /// Appends a registry. There is no way to remove it again.
    pub(crate) fn retain(&self, registry: Arc<RegistryCore>) {
        let mut registries = self.registries.lock();
        registries.push(registry);
        let total = registries.len();
        drop(registries);

        crate::tracing::internal::log_registry_retained(total);
    }

    /// Returns the number of registries retained so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.registries.lock().len()
    }

    /// Returns whether no registry has been created yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registries.lock().is_empty()
    }

    /// Takes a snapshot of the retained registries.
    ///
    /// The lock is released before the snapshot is returned, so callbacks run
    /// while sweeping the snapshot may create new registries.
    pub(crate) fn snapshot(&self) -> Vec<Arc<RegistryCore>> {
        self.registries.lock().clone()
    }
}

impl Debug for RetainedRegistries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetainedRegistries")
            .field("len", &self.len())
            .finish()
    }
}

static GLOBAL: OnceLock<RetainedRegistries> = OnceLock::new();
