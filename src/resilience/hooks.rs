use std::fmt;
use std::sync::Arc;

use super::breaker::Breaker;

/// What a classifier or hook sees about a single attempt
pub struct AttemptContext<'a, T, E, A> {
    /// Breaker the attempt ran through (read-only)
    pub breaker: &'a Breaker<T, E, A>,
    /// Raw outcome of the action
    pub outcome: &'a Result<T, E>,
    /// Arguments the action was invoked with
    pub args: &'a A,
    /// 1-based attempt number within the current call
    pub attempt: u32,
}

impl<T, E, A> fmt::Debug for AttemptContext<'_, T, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptContext")
            .field("breaker", &self.breaker.name())
            .field("succeeded", &self.outcome.is_ok())
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Decides whether an attempt counts as a failure
pub type FailureClassifier<T, E, A> =
    Arc<dyn Fn(Option<&E>, &AttemptContext<'_, T, E, A>) -> bool + Send + Sync>;

/// Fallback producing the call's result once the retry budget is exhausted
pub type FailureHook<T, E, A> =
    Arc<dyn Fn(Option<&E>, &AttemptContext<'_, T, E, A>) -> Result<T, E> + Send + Sync>;

/// Invoked on the closed -> open transition
pub type OpenHook<T, E, A> =
    Arc<dyn Fn(Option<&E>, &AttemptContext<'_, T, E, A>) -> anyhow::Result<()> + Send + Sync>;

/// Invoked on the open -> closed transition
pub type CloseHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

pub(crate) struct Hooks<T, E, A> {
    /// `None` counts every `Err` as a failure
    pub(crate) classifier: Option<FailureClassifier<T, E, A>>,
    pub(crate) on_failure: Option<FailureHook<T, E, A>>,
    pub(crate) on_open: Option<OpenHook<T, E, A>>,
    pub(crate) on_close: Option<CloseHook>,
}

impl<T, E, A> Hooks<T, E, A> {
    pub(crate) fn classify(&self, ctx: &AttemptContext<'_, T, E, A>) -> bool {
        let failure = ctx.outcome.as_ref().err();

        match &self.classifier {
            Some(classifier) => classifier(failure, ctx),
            None => failure.is_some(),
        }
    }
}

impl<T, E, A> fmt::Debug for Hooks<T, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("classifier", &self.classifier.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}
