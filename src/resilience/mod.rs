//! Circuit breaker for protecting a downstream dependency
//!
//! A [`Breaker`] wraps a fallible action supplied at call time. Failed attempts
//! are retried immediately; once `max_retries` consecutive failures pile up in
//! one call the circuit opens and calls are rejected with
//! [`BreakerError::Open`] until `open_duration` has passed.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use lighter_breaker::resilience::{Breaker, BreakerError};
//!
//! let breaker = Breaker::<u64, std::io::Error>::builder("ledger")
//!     .max_retries(3)
//!     .open_duration(Duration::from_secs(30))
//!     .on_open(|failure, ctx| {
//!         eprintln!("{} opened: {:?}", ctx.breaker.name(), failure);
//!         Ok(())
//!     })
//!     .on_failure(|_, _| Ok(0))
//!     .build()
//!     .expect("valid configuration");
//!
//! // Degrades to the fallback once the retries are exhausted
//! let balance = breaker.run(|_| Err(std::io::Error::other("ledger down")), ());
//! assert_eq!(balance.unwrap(), 0);
//!
//! // Fails fast while open
//! let rejected = breaker.run(|_| Ok(100), ());
//! assert!(matches!(rejected, Err(BreakerError::Open(_))));
//! ```

mod breaker;
mod clock;
mod error;
mod hooks;

pub use breaker::{Breaker, BreakerBuilder, BreakerStats, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock, deadline_after, is_open_at};
pub use error::{BreakerError, CircuitOpenError};
pub use hooks::{AttemptContext, CloseHook, FailureClassifier, FailureHook, OpenHook};
