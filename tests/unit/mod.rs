pub mod config_test;
pub mod metrics_test;
