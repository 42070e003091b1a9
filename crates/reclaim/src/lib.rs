//! A harness for proving that objects are released when their owner is torn down.
//!
//! `reclaim` watches objects through weak probes and reports, per logical
//! [`Key`], when each one has been reclaimed. A scenario registers the objects
//! it cares about on a [`FinalizationRegistry`], performs the teardown that is
//! supposed to release them, and lets the harness do the rest:
//!
//! - a [`CollectionDriver`] calls [`collect`] on a timer, which sweeps every
//!   registry's weak table and delivers notifications for dead objects,
//! - an [`ExpectedKeys`] tracker resolves the scenario once every expected key
//!   has been observed,
//! - the [`Scenario`] runner settles exactly once, on success, on the first
//!   failure routed through [`Settle`], or on timeout.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use reclaim::{Scenario, Settle};
//!
//! struct Widget;
//!
//! # async fn run() -> reclaim::Result<()> {
//! Scenario::new("widget is dropped")
//!     .run(|settle: Settle| async move {
//!         let expected = settle.expect(["widget"])?;
//!         let registry = settle.registry(expected, |_key| Ok(()));
//!
//!         let widget = Arc::new(Widget);
//!         registry.register(&widget, "widget");
//!         drop(widget);
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Writing scenarios as tests
//!
//! With the `macros` feature (enabled by default) an `async fn` taking a
//! [`Settle`] can be turned into a `#[test]`:
//!
//! ```ignore
//! #[reclaim::scenario(timeout_ms = 5000)]
//! async fn widget_is_dropped(settle: reclaim::Settle) -> reclaim::Result<()> {
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! # Reclamation model
//!
//! Watched objects are reference counted, so their value is dropped the moment
//! the last strong handle goes away. Notification is deferred: nothing is
//! delivered until a collection sweeps the registry that watches the object.
//! Registries are retained in a process-wide list for the lifetime of the
//! process so that pending notifications are never lost.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod collect;
mod config;
mod driver;
mod error;
mod key;
mod metrics;
mod panic;
mod registry;
mod retained;
mod runner;
mod settle;
mod tracing;
mod tracker;

// Re-export public API
pub use collect::{collect, CollectInfo};
pub use config::HarnessConfig;
pub use driver::CollectionDriver;
pub use error::{BoxError, CallbackResult, Error, Result};
pub use key::Key;
pub use metrics::{harness_metrics, HarnessMetrics};
pub use registry::{FinalizationRegistry, Probe, Reclaimable};
pub use retained::RetainedRegistries;
pub use runner::{run_scenario, Scenario, ScenarioReport, ScenarioState};
pub use settle::Settle;
pub use tracker::ExpectedKeys;

// Re-export the attribute macro when the feature is enabled
#[cfg(feature = "macros")]
pub use reclaim_macros::scenario;

#[doc(hidden)]
pub mod __private {
    pub use tokio;
}
