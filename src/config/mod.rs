pub mod breaker;

pub use breaker::BreakerSettings;

/// Environment variable prefix used by [`load`], e.g. `LIGHTER_BREAKER__MAX_RETRIES=3`
pub const ENV_PREFIX: &str = "LIGHTER_BREAKER";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is present but not acceptable
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    /// A source could not be read or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Checks a configuration value for consistency after it was built or loaded
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Load breaker settings from an optional file and environment variables
pub fn load(path: Option<&std::path::Path>) -> Result<BreakerSettings, ConfigError> {
    breaker::load_settings(path)
}
