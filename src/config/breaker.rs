use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ENV_PREFIX, Validate};

/// Breaker settings that can come from a file or the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Attempts allowed within one call before the circuit opens
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How long the circuit stays open once tripped, in milliseconds
    #[serde(default = "default_open_duration_ms")]
    pub open_duration_ms: u64,
}

fn default_max_retries() -> u32 {
    10
}

fn default_open_duration_ms() -> u64 {
    10_000 // 10 seconds
}

impl BreakerSettings {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    /// See [`crate::config::load`]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        load_settings(path)
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            open_duration_ms: default_open_duration_ms(),
        }
    }
}

impl Validate for BreakerSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "breaker.max_retries must be > 0".to_string(),
            ));
        }
        if self.open_duration_ms == 0 {
            return Err(ConfigError::ValidationError(
                "breaker.open_duration_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings with the following precedence (highest to lowest):
/// 1. Environment variables: LIGHTER_BREAKER__MAX_RETRIES=3
/// 2. The given file, if any (format picked from its extension)
/// 3. Built-in defaults
pub(super) fn load_settings(path: Option<&Path>) -> Result<BreakerSettings, ConfigError> {
    use config::{Config, Environment, File};

    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(false));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: BreakerSettings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        max_retries = settings.max_retries,
        open_duration_ms = settings.open_duration_ms,
        "Loaded circuit breaker settings"
    );

    Ok(settings)
}
