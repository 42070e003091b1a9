//! Error types for the harness.

use std::sync::Arc;
use std::time::Duration;

use crate::key::Key;

/// Boxed error accepted from user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Return type of a finalization callback.
///
/// Returning `Err` is equivalent to panicking inside the callback: the
/// failure is rerouted to the registry's error handler.
pub type CallbackResult = std::result::Result<(), BoxError>;

/// Alias for `Result<T, reclaim::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The single error type for all harness operations.
///
/// Configuration errors (`NoExpectedKeys`, `InvalidConfig`) are returned
/// synchronously. Every other variant reaches the caller through the
/// scenario's settlement.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A tracker was created without any key to wait for.
    #[error("expected key set is empty; a scenario must wait for at least one key")]
    NoExpectedKeys,

    /// A [`HarnessConfig`](crate::HarnessConfig) value was rejected.
    #[error("invalid harness configuration: {0}")]
    InvalidConfig(String),

    /// A finalization callback panicked while handling `key`.
    #[error("finalization callback for `{key}` panicked: {message}")]
    CallbackPanicked {
        /// Key that was being delivered.
        key: Key,
        /// Panic payload, rendered as text.
        message: String,
    },

    /// A finalization callback returned an error while handling `key`.
    #[error("finalization callback for `{key}` failed: {source}")]
    Callback {
        /// Key that was being delivered.
        key: Key,
        /// The error returned by the callback.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The scenario body panicked.
    #[error("scenario body panicked: {0}")]
    BodyPanicked(String),

    /// The scenario was rejected with a user error.
    #[error("scenario rejected: {0}")]
    Rejected(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// The scenario did not settle before its deadline.
    #[error("scenario `{scenario}` timed out after {after:?} with pending keys {pending:?}")]
    Timeout {
        /// Scenario name.
        scenario: String,
        /// Configured timeout.
        after: Duration,
        /// Keys still pending on trackers created through the scenario's settle handle.
        pending: Vec<Key>,
    },

    /// Every settle handle was dropped without settling.
    #[error("scenario was abandoned before it settled")]
    Abandoned,
}

impl Error {
    /// Wraps an arbitrary error as an explicit rejection.
    pub fn rejected(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Rejected(Arc::new(e))
    }

    pub(crate) fn callback(key: Key, e: BoxError) -> Self {
        Self::Callback {
            key,
            source: Arc::from(e),
        }
    }

    /// Returns `true` for errors caused by the scenario running out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for synchronous configuration errors.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::NoExpectedKeys | Self::InvalidConfig(_))
    }
}

impl From<BoxError> for Error {
    fn from(e: BoxError) -> Self {
        Self::Rejected(Arc::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_error_keeps_source() {
        let err = Error::callback(Key::from("cache"), "boom".into());
        assert_eq!(
            err.to_string(),
            "finalization callback for `cache` failed: boom"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_classification() {
        assert!(Error::NoExpectedKeys.is_config());
        assert!(Error::InvalidConfig("tick".into()).is_config());
        let timeout = Error::Timeout {
            scenario: "s".into(),
            after: Duration::from_secs(1),
            pending: vec![Key::from("a")],
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_config());
    }
}
