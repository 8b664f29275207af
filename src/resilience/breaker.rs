//! Circuit breaker state machine and retry loop.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐  max_retries consecutive   ┌─────────┐
//! │ Closed  │ ─────────────────────────► │  Open   │
//! │ (Normal)│   failures in one call     │(Failing)│
//! └─────────┘ ◄───────────────────────── └─────────┘
//!              first call after open_duration
//!              (that call becomes the probe)
//! ```
//!
//! Within one call the action is retried immediately, with the same arguments,
//! until it succeeds or the retry budget is exhausted. There is no half-open
//! state: the probe runs the normal retry loop and may reopen the circuit on the
//! same call.

use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{BreakerSettings, ConfigError, Validate};
use crate::metrics::BreakerMetrics;

use super::clock::{Clock, SystemClock, deadline_after, is_open_at};
use super::error::{BreakerError, CircuitOpenError};
use super::hooks::{AttemptContext, CloseHook, FailureClassifier, FailureHook, Hooks, OpenHook};

/// Observable circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls run the action
    Closed,
    /// Calls are rejected until the open window ends
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
        }
    }
}

/// Mutable state, only touched under the breaker's mutex
#[derive(Debug, Default)]
struct BreakerState {
    /// Consecutive classified failures in the current retry loop
    failure_count: u32,
    /// Set iff the circuit is open
    open_until: Option<Instant>,
}

/// Lifetime counters; never reset
#[derive(Debug, Default)]
struct Counters {
    total_calls: AtomicU64,
    total_attempts: AtomicU64,
    total_failures: AtomicU64,
    rejected_calls: AtomicU64,
    times_opened: AtomicU64,
    times_closed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BreakerStats {
        BreakerStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            times_opened: self.times_opened.load(Ordering::Relaxed),
            times_closed: self.times_closed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a breaker's lifetime statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    /// Calls to `run`/`run_async`, rejected ones included
    pub total_calls: u64,
    /// Action invocations
    pub total_attempts: u64,
    /// Attempts classified as failures
    pub total_failures: u64,
    /// Calls rejected while open
    pub rejected_calls: u64,
    pub times_opened: u64,
    pub times_closed: u64,
}

enum Admission {
    Closed,
    Reclosed,
    Rejected(Duration),
}

enum Step {
    Succeeded,
    Retry { failure_count: u32 },
    Tripped { open_until: Instant },
    OpenedElsewhere,
}

/// Circuit breaker around a fallible action
///
/// `T` is whatever the action returns (use `()` or a tuple for zero or many
/// values), `E` its failure type and `A` the arguments it is invoked with.
///
/// Clones share state, so one breaker can be handed to many threads. Each retry
/// step's read-modify-write of the shared state happens under a mutex; the
/// action and all hooks run outside of it.
pub struct Breaker<T, E, A = ()> {
    name: String,
    max_retries: u32,
    open_duration: Duration,
    hooks: Arc<Hooks<T, E, A>>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<BreakerState>>,
    counters: Arc<Counters>,
    metrics: BreakerMetrics,
}

impl<T, E, A> Clone for Breaker<T, E, A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            max_retries: self.max_retries,
            open_duration: self.open_duration,
            hooks: Arc::clone(&self.hooks),
            clock: Arc::clone(&self.clock),
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T, E, A> Breaker<T, E, A> {
    /// Create a breaker with default configuration
    ///
    /// 10 retries, 10 seconds open, every `Err` counts as a failure, no hooks.
    pub fn new(name: impl Into<String>) -> Self {
        BreakerBuilder::new(name).assemble()
    }

    pub fn builder(name: impl Into<String>) -> BreakerBuilder<T, E, A> {
        BreakerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }

    /// Current state as seen by the next call
    ///
    /// Reports `Closed` once the open window has elapsed, even though the
    /// transition itself only happens on the next call.
    pub fn state(&self) -> CircuitState {
        let state = self.lock_state();
        if is_open_at(self.clock.now(), state.open_until) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.lock_state().failure_count
    }

    /// Instant the circuit stays open until, if it is open
    pub fn open_until(&self) -> Option<Instant> {
        self.lock_state().open_until
    }

    /// Time left in the open window, `None` when calls would be admitted
    pub fn remaining_open(&self) -> Option<Duration> {
        let until = self.lock_state().open_until?;
        let now = self.clock.now();
        is_open_at(now, Some(until)).then(|| until - now)
    }

    pub fn stats(&self) -> BreakerStats {
        self.counters.snapshot()
    }

    /// Run `action` with `args` through the breaker
    ///
    /// Returns the action's result as soon as an attempt is not classified as a
    /// failure. After `max_retries` failures the circuit opens and the call
    /// returns the `on_failure` fallback if configured, otherwise the last raw
    /// outcome. While the circuit is open the action is not invoked and
    /// [`BreakerError::Open`] is returned.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lighter_breaker::Breaker;
    ///
    /// let breaker = Breaker::<String, std::io::Error, u16>::new("profiles");
    ///
    /// let result = breaker.run(|port| Ok(format!("localhost:{port}")), 8080);
    /// assert_eq!(result.unwrap(), "localhost:8080");
    /// ```
    pub fn run<F>(&self, mut action: F, args: A) -> Result<T, BreakerError<E>>
    where
        F: FnMut(&A) -> Result<T, E>,
    {
        self.admit()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = action(&args);

            if let ControlFlow::Break(result) = self.settle(outcome, &args, attempt) {
                return result;
            }
        }
    }

    /// Same as [`Breaker::run`] for an action returning a future
    ///
    /// The state lock is never held across an await point.
    pub async fn run_async<F, Fut>(&self, mut action: F, args: A) -> Result<T, BreakerError<E>>
    where
        F: FnMut(&A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = action(&args).await;

            if let ControlFlow::Break(result) = self.settle(outcome, &args, attempt) {
                return result;
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gate at the start of every call; closes the circuit lazily.
    fn admit(&self) -> Result<(), BreakerError<E>> {
        Counters::bump(&self.counters.total_calls);

        let admission = {
            let mut state = self.lock_state();
            let now = self.clock.now();

            match state.open_until {
                Some(until) if is_open_at(now, Some(until)) => Admission::Rejected(until - now),
                Some(_) => {
                    state.open_until = None;
                    state.failure_count = 0;
                    Admission::Reclosed
                }
                None => {
                    state.failure_count = 0;
                    Admission::Closed
                }
            }
        };

        match admission {
            Admission::Closed => Ok(()),
            Admission::Rejected(remaining) => {
                Counters::bump(&self.counters.rejected_calls);
                self.metrics.record_rejected();
                tracing::debug!(
                    circuit_breaker = %self.name,
                    remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                    "Circuit breaker rejected call while open"
                );

                Err(BreakerError::Open(CircuitOpenError {
                    name: self.name.clone(),
                    remaining,
                }))
            }
            Admission::Reclosed => {
                Counters::bump(&self.counters.times_closed);
                self.metrics.record_closed();
                tracing::info!(
                    circuit_breaker = %self.name,
                    state = "Open -> Closed",
                    "Circuit breaker closed after open window elapsed"
                );

                if let Some(on_close) = &self.hooks.on_close {
                    on_close().map_err(BreakerError::Hook)?;
                }

                Ok(())
            }
        }
    }

    /// Classify one attempt and decide whether the call continues.
    fn settle(
        &self,
        outcome: Result<T, E>,
        args: &A,
        attempt: u32,
    ) -> ControlFlow<Result<T, BreakerError<E>>> {
        Counters::bump(&self.counters.total_attempts);

        let ctx = AttemptContext {
            breaker: self,
            outcome: &outcome,
            args,
            attempt,
        };

        let failed = self.hooks.classify(&ctx);
        self.metrics.record_attempt(failed);
        if failed {
            Counters::bump(&self.counters.total_failures);
        }

        match self.record(failed, attempt) {
            Step::Succeeded => {}
            Step::Retry { failure_count } => {
                tracing::debug!(
                    circuit_breaker = %self.name,
                    attempt,
                    failure_count,
                    max_retries = self.max_retries,
                    "Retrying failed attempt"
                );
                return ControlFlow::Continue(());
            }
            Step::OpenedElsewhere => {
                tracing::debug!(
                    circuit_breaker = %self.name,
                    attempt,
                    "Circuit opened by a concurrent call, giving up"
                );
            }
            Step::Tripped { open_until } => {
                Counters::bump(&self.counters.times_opened);
                self.metrics.record_opened();
                let open_for = open_until.saturating_duration_since(self.clock.now());
                tracing::warn!(
                    circuit_breaker = %self.name,
                    state = "Closed -> Open",
                    failure_count = self.max_retries,
                    max_retries = self.max_retries,
                    open_for_ms = u64::try_from(open_for.as_millis()).unwrap_or(u64::MAX),
                    "Circuit breaker opened due to consecutive failures"
                );

                let failure = outcome.as_ref().err();

                if let Some(on_open) = &self.hooks.on_open {
                    if let Err(err) = on_open(failure, &ctx) {
                        return ControlFlow::Break(Err(BreakerError::Hook(err)));
                    }
                }

                if let Some(on_failure) = &self.hooks.on_failure {
                    return ControlFlow::Break(
                        on_failure(failure, &ctx).map_err(BreakerError::Action),
                    );
                }
            }
        }

        ControlFlow::Break(outcome.map_err(BreakerError::Action))
    }

    /// The serialized read-modify-write of one retry step.
    fn record(&self, failed: bool, attempt: u32) -> Step {
        let mut state = self.lock_state();

        if !failed {
            if state.open_until.is_none() {
                state.failure_count = 0;
            }
            return Step::Succeeded;
        }

        if state.open_until.is_some() {
            return Step::OpenedElsewhere;
        }

        state.failure_count = (state.failure_count + 1).min(self.max_retries);

        // A concurrent call may have reset the shared count; this call's own
        // attempts are bounded as well.
        if state.failure_count < self.max_retries && attempt < self.max_retries {
            return Step::Retry {
                failure_count: state.failure_count,
            };
        }

        let open_until = deadline_after(self.clock.now(), self.open_duration);
        state.failure_count = self.max_retries;
        state.open_until = Some(open_until);

        Step::Tripped { open_until }
    }
}

impl<T, E, A> fmt::Debug for Breaker<T, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .field("max_retries", &self.max_retries)
            .field("open_duration", &self.open_duration)
            .field("hooks", &self.hooks)
            .field("clock", &self.clock)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Builder for [`Breaker`]; configuration is fixed once built
pub struct BreakerBuilder<T, E, A = ()> {
    name: String,
    max_retries: u32,
    open_duration: Duration,
    classifier: Option<FailureClassifier<T, E, A>>,
    on_failure: Option<FailureHook<T, E, A>>,
    on_open: Option<OpenHook<T, E, A>>,
    on_close: Option<CloseHook>,
    clock: Arc<dyn Clock>,
}

impl<T, E, A> BreakerBuilder<T, E, A> {
    pub fn new(name: impl Into<String>) -> Self {
        let defaults = BreakerSettings::default();

        Self {
            name: name.into(),
            max_retries: defaults.max_retries,
            open_duration: defaults.open_duration(),
            classifier: None,
            on_failure: None,
            on_open: None,
            on_close: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Take `max_retries` and the open duration from loaded settings
    pub fn settings(mut self, settings: &BreakerSettings) -> Self {
        self.max_retries = settings.max_retries;
        self.open_duration = settings.open_duration();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn open_duration(mut self, open_duration: Duration) -> Self {
        self.open_duration = open_duration;
        self
    }

    /// Decide which attempts count as failures (default: any `Err`)
    pub fn failure_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(Option<&E>, &AttemptContext<'_, T, E, A>) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Fallback whose result is returned once the retry budget is exhausted
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&E>, &AttemptContext<'_, T, E, A>) -> Result<T, E> + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    pub fn on_open<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&E>, &AttemptContext<'_, T, E, A>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.on_open = Some(Arc::new(hook));
        self
    }

    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(hook));
        self
    }

    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate the configuration and create the breaker
    pub fn build(self) -> Result<Breaker<T, E, A>, ConfigError> {
        self.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> Breaker<T, E, A> {
        let metrics = BreakerMetrics::new(&self.name);

        Breaker {
            name: self.name,
            max_retries: self.max_retries,
            open_duration: self.open_duration,
            hooks: Arc::new(Hooks {
                classifier: self.classifier,
                on_failure: self.on_failure,
                on_open: self.on_open,
                on_close: self.on_close,
            }),
            clock: self.clock,
            state: Arc::new(Mutex::new(BreakerState::default())),
            counters: Arc::new(Counters::default()),
            metrics,
        }
    }
}

impl<T, E, A> Validate for BreakerBuilder<T, E, A> {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "breaker.max_retries must be > 0".to_string(),
            ));
        }
        if self.open_duration.is_zero() {
            return Err(ConfigError::ValidationError(
                "breaker.open_duration must be > 0".to_string(),
            ));
        }
        if Instant::now().checked_add(self.open_duration).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "breaker.open_duration {:?} is too large",
                self.open_duration
            )));
        }
        Ok(())
    }
}
