//! Harness timing configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Timing knobs for a scenario run.
///
/// Use the builder methods to customize, or [`Default`] for the usual
/// values: a collection every 100ms for at most 10s, and a 15s overall
/// scenario timeout.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use reclaim::HarnessConfig;
///
/// let config = HarnessConfig::default()
///     .with_tick(Duration::from_millis(20))
///     .with_max_window(Duration::from_secs(2))
///     .with_timeout(Duration::from_secs(3));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HarnessConfig {
    /// Delay between two forced collections.
    /// Default: 100ms
    pub tick: Duration,

    /// How long the collection driver keeps rescheduling itself.
    /// Reaching the end of the window does not fail the scenario.
    /// Default: 10s
    pub max_window: Duration,

    /// Overall scenario deadline. Normally longer than `max_window`.
    /// Default: 15s
    pub timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tick: Self::DEFAULT_TICK,
            max_window: Self::DEFAULT_MAX_WINDOW,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

impl HarnessConfig {
    /// Default delay between forced collections.
    pub const DEFAULT_TICK: Duration = Duration::from_millis(100);
    /// Default collection window.
    pub const DEFAULT_MAX_WINDOW: Duration = Duration::from_secs(10);
    /// Default scenario timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Sets the delay between forced collections.
    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets how long the collection driver keeps running.
    #[must_use]
    pub const fn with_max_window(mut self, window: Duration) -> Self {
        self.max_window = window;
        self
    }

    /// Sets the overall scenario timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that the configuration can drive a scenario.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the tick or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(Error::InvalidConfig("tick must be non-zero".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be non-zero".into()));
        }
        Ok(())
    }
}
