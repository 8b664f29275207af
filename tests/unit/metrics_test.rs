//! Metrics emitted by a breaker going through a full open/close cycle

use std::time::Duration;

use lighter_breaker::metrics::{
    ATTEMPTS_TOTAL, BreakerMetrics, REJECTED_TOTAL, STATE, TRANSITIONS_TOTAL,
};
use lighter_breaker::{Breaker, ManualClock};
use metrics_exporter_prometheus::PrometheusBuilder;

#[derive(Debug)]
struct Refused;

fn series_value(rendered: &str, name: &str, labels: &[&str]) -> Option<String> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find(|line| line.starts_with(name) && labels.iter().all(|label| line.contains(label)))
        .and_then(|line| line.rsplit(' ').next())
        .map(str::to_string)
}

#[test]
fn test_full_cycle_metrics() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let clock = ManualClock::new();

    metrics::with_local_recorder(&recorder, || {
        BreakerMetrics::describe();

        let breaker = Breaker::<u8, Refused>::builder("billing")
            .max_retries(2)
            .open_duration(Duration::from_secs(1))
            .clock(clock.clone())
            .build()
            .unwrap();

        let _ = breaker.run(|_| Err(Refused), ());
        let _ = breaker.run(|_| Ok(1), ());
        clock.advance(Duration::from_secs(1));
        let _ = breaker.run(|_| Ok(1), ());
    });

    let rendered = handle.render();
    let billing = r#"breaker="billing""#;

    for name in [ATTEMPTS_TOTAL, TRANSITIONS_TOTAL, REJECTED_TOTAL, STATE] {
        assert!(rendered.contains(&format!("# HELP {name} ")), "{name} is not described");
    }

    assert_eq!(
        series_value(&rendered, ATTEMPTS_TOTAL, &[billing, r#"outcome="failure""#]).as_deref(),
        Some("2")
    );
    assert_eq!(
        series_value(&rendered, ATTEMPTS_TOTAL, &[billing, r#"outcome="success""#]).as_deref(),
        Some("1")
    );
    assert_eq!(
        series_value(&rendered, TRANSITIONS_TOTAL, &[billing, r#"transition="opened""#]).as_deref(),
        Some("1")
    );
    assert_eq!(
        series_value(&rendered, TRANSITIONS_TOTAL, &[billing, r#"transition="closed""#]).as_deref(),
        Some("1")
    );
    assert_eq!(series_value(&rendered, REJECTED_TOTAL, &[billing]).as_deref(), Some("1"));
    let state = series_value(&rendered, STATE, &[billing]).and_then(|v| v.parse::<f64>().ok());
    assert_eq!(state, Some(0.0));
}
