//! Async scenario runner.
//!
//! A [`Scenario`] starts a [`CollectionDriver`], runs the scenario body on its
//! own task and waits for the body's [`Settle`] handle to be settled, or for
//! the overall timeout. Whatever ends the wait, the driver and the body task
//! are released by drop guards on the way out.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinError;
use tokio::time::{self, Instant};
use tokio_util::task::AbortOnDropHandle;

use crate::config::HarnessConfig;
use crate::driver::CollectionDriver;
use crate::error::{Error, Result};
use crate::settle::Settle;

/// Lifecycle of a scenario run.
///
/// `Pending -> Running -> Succeeded | Failed`. `Running` is left exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioState {
    /// Not started yet.
    Pending,
    /// Driver started, waiting for settlement.
    Running,
    /// Every expected key was observed before the deadline.
    Succeeded,
    /// Rejected, panicked or timed out.
    Failed,
}

/// Summary of a passed scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Final state, always [`ScenarioState::Succeeded`] in a returned report.
    pub state: ScenarioState,
    /// Time from start to settlement.
    pub elapsed: Duration,
    /// Collections issued by the driver while the scenario ran.
    pub collections: u64,
}

/// A named scenario with its timing configuration.
///
/// # Example
///
/// ```ignore
/// let report = Scenario::new("cache is released after stop")
///     .with_config(HarnessConfig::default().with_timeout(Duration::from_secs(5)))
///     .run(|settle| async move {
///         let expected = settle.expect(["cache"])?;
///         let registry = settle.registry(expected, |_| Ok(()));
///         // register objects, tear down their owner ...
///         Ok(())
///     })
///     .await?;
/// assert_eq!(report.state, ScenarioState::Succeeded);
/// ```
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    config: HarnessConfig,
    state: ScenarioState,
}

impl Scenario {
    /// Creates a pending scenario with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: HarnessConfig::default(),
            state: ScenarioState::Pending,
        }
    }

    /// Replaces the timing configuration.
    #[must_use]
    pub const fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the timing configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ScenarioState {
        self.state
    }

    fn transition(&mut self, to: ScenarioState) {
        debug_assert!(
            matches!(
                (self.state, to),
                (ScenarioState::Pending, ScenarioState::Running)
                    | (
                        ScenarioState::Running,
                        ScenarioState::Succeeded | ScenarioState::Failed
                    )
            ),
            "invalid scenario transition {:?} -> {to:?}",
            self.state
        );
        crate::tracing::internal::log_transition(self.state, to);
        self.state = to;
    }

    /// Runs the scenario to settlement.
    ///
    /// `body` receives the scenario's [`Settle`] handle and runs on a spawned
    /// task, concurrently with the collection driver. Returning `Err` from the
    /// body, or panicking in it, rejects the scenario. Returning `Ok(())`
    /// leaves completion to the settle handle, or to its clones; once every
    /// clone is dropped unsettled the scenario is abandoned.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the configuration does not validate;
    /// - the error the scenario was rejected with;
    /// - [`Error::Abandoned`] if every settle handle was dropped unsettled;
    /// - [`Error::Timeout`] if nothing settled the scenario in time.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime with the time driver
    /// enabled.
    pub async fn run<F, Fut>(mut self, body: F) -> Result<ScenarioReport>
    where
        F: FnOnce(Settle) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.config.validate()?;

        let span = crate::tracing::internal::trace_scenario(&self.name);
        let started = Instant::now();
        let (settle, mut settled) = Settle::pair();
        span.in_scope(|| self.transition(ScenarioState::Running));

        let driver = CollectionDriver::start(&self.config);
        let monitor = settle.monitor();
        let mut body = AbortOnDropHandle::new(tokio::spawn(body(settle)));
        let mut body_done = false;
        let mut body_error = None;

        let waited = time::timeout(self.config.timeout, async {
            loop {
                tokio::select! {
                    outcome = &mut settled => {
                        let Ok(outcome) = outcome else {
                            // Every handle is gone. A failed body still reports
                            // its own error.
                            if !body_done {
                                body_error = body_failure((&mut body).await);
                            }
                            return Err(body_error.take().unwrap_or(Error::Abandoned));
                        };
                        return outcome;
                    }
                    joined = &mut body, if !body_done => {
                        body_done = true;
                        body_error = body_failure(joined);
                        if let Some(error) = &body_error {
                            monitor.reject(error.clone());
                        }
                    }
                }
            }
        })
        .await;

        let outcome = waited.unwrap_or_else(|_elapsed| {
            let error = Error::Timeout {
                scenario: self.name.clone(),
                after: self.config.timeout,
                pending: monitor.pending_keys(),
            };
            // Later callbacks must find the scenario settled.
            monitor.reject(error.clone());
            Err(error)
        });

        driver.cancel();
        let collections = driver.ticks();
        drop(driver);
        drop(body);

        span.in_scope(|| match outcome {
            Ok(()) => {
                self.transition(ScenarioState::Succeeded);
                let elapsed = started.elapsed();
                crate::tracing::internal::log_succeeded(elapsed, collections);
                Ok(ScenarioReport {
                    name: self.name.clone(),
                    state: self.state,
                    elapsed,
                    collections,
                })
            }
            Err(error) => {
                self.transition(ScenarioState::Failed);
                crate::tracing::internal::log_failed(&error);
                Err(error)
            }
        })
    }
}

fn body_failure(joined: std::result::Result<Result<()>, JoinError>) -> Option<Error> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error),
        Err(e) if e.is_panic() => Some(Error::BodyPanicked(crate::panic::panic_message(
            e.into_panic().as_ref(),
        ))),
        Err(_) => Some(Error::Abandoned),
    }
}

/// Runs `body` as the scenario `name` with `config`.
///
/// Shorthand for `Scenario::new(name).with_config(config).run(body)`.
///
/// # Errors
///
/// See [`Scenario::run`].
pub async fn run_scenario<F, Fut>(
    name: impl Into<String>,
    config: HarnessConfig,
    body: F,
) -> Result<ScenarioReport>
where
    F: FnOnce(Settle) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Scenario::new(name).with_config(config).run(body).await
}
