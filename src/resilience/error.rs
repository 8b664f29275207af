use std::time::Duration;

/// Returned instead of running the action while the circuit is open
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Circuit breaker is open for {name} ({remaining:?} remaining)")]
pub struct CircuitOpenError {
    /// Breaker that rejected the call
    pub name: String,
    /// Time left until the next call is allowed through
    pub remaining: Duration,
}

/// Circuit breaker error
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// Circuit is open, the action was not invoked
    #[error(transparent)]
    Open(CircuitOpenError),
    /// The action's own failure once the retry budget ran out
    #[error(transparent)]
    Action(E),
    /// An `on_open` or `on_close` hook failed
    #[error(transparent)]
    Hook(anyhow::Error),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open(_))
    }

    /// The action's failure value, if this is one.
    pub fn into_action(self) -> Option<E> {
        match self {
            BreakerError::Action(err) => Some(err),
            _ => None,
        }
    }
}
