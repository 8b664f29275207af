#![deny(warnings)]

//! Circuit breaker around a caller-supplied fallible action.
//!
//! After `max_retries` consecutive classified failures within one call the
//! breaker opens and rejects further calls for `open_duration`; the first call
//! after the window elapses closes it again and runs as the probe.
//!
//! ```rust
//! use lighter_breaker::{Breaker, BreakerError};
//!
//! let breaker = Breaker::<u32, std::io::Error>::builder("inventory")
//!     .max_retries(3)
//!     .build()
//!     .expect("valid configuration");
//!
//! let value = breaker.run(|_| Ok(42), ());
//! assert!(matches!(value, Ok(42)));
//!
//! let failed = breaker.run(|_| Err(std::io::Error::other("down")), ());
//! assert!(matches!(failed, Err(BreakerError::Action(_))));
//! ```

pub mod config;
pub mod metrics;
pub mod resilience;

pub use crate::config::{BreakerSettings, ConfigError, Validate};
pub use crate::resilience::{
    AttemptContext, Breaker, BreakerBuilder, BreakerError, BreakerStats, CircuitOpenError,
    CircuitState, Clock, ManualClock, SystemClock,
};
