//! Breaker metrics recorded through the `metrics` facade.
//!
//! The library never installs a recorder; whatever the embedding application
//! installs (Prometheus exporter, statsd, ...) receives these series. Call
//! [`BreakerMetrics::describe`] right after installing it.

use metrics::{counter, describe_counter, describe_gauge, gauge};

pub const ATTEMPTS_TOTAL: &str = "circuit_breaker_attempts_total";
pub const TRANSITIONS_TOTAL: &str = "circuit_breaker_transitions_total";
pub const REJECTED_TOTAL: &str = "circuit_breaker_rejected_total";
pub const STATE: &str = "circuit_breaker_state";

/// Per-breaker metric handle, labelled with the breaker name
#[derive(Debug, Clone)]
pub struct BreakerMetrics {
    breaker: String,
}

impl BreakerMetrics {
    pub fn new(breaker: &str) -> Self {
        Self {
            breaker: breaker.to_string(),
        }
    }

    /// Register metric descriptions with the currently installed recorder
    pub fn describe() {
        describe_counter!(
            ATTEMPTS_TOTAL,
            "Total number of action attempts made through a circuit breaker"
        );
        describe_counter!(
            TRANSITIONS_TOTAL,
            "Total number of circuit breaker state transitions"
        );
        describe_counter!(
            REJECTED_TOTAL,
            "Total number of calls rejected while the circuit was open"
        );
        describe_gauge!(STATE, "Circuit breaker state (0 = closed, 1 = open)");
    }

    pub fn record_attempt(&self, failed: bool) {
        let outcome = if failed { "failure" } else { "success" };

        counter!(
            ATTEMPTS_TOTAL,
            "breaker" => self.breaker.clone(),
            "outcome" => outcome,
        )
        .increment(1);
    }

    pub fn record_opened(&self) {
        counter!(
            TRANSITIONS_TOTAL,
            "breaker" => self.breaker.clone(),
            "transition" => "opened",
        )
        .increment(1);
        gauge!(STATE, "breaker" => self.breaker.clone()).set(1.0);
    }

    pub fn record_closed(&self) {
        counter!(
            TRANSITIONS_TOTAL,
            "breaker" => self.breaker.clone(),
            "transition" => "closed",
        )
        .increment(1);
        gauge!(STATE, "breaker" => self.breaker.clone()).set(0.0);
    }

    pub fn record_rejected(&self) {
        counter!(REJECTED_TOTAL, "breaker" => self.breaker.clone()).increment(1);
    }
}
