//! Configuration loader with layered sources.

use crate::AppConfig;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use strata_core::StrataError;
use tracing::{debug, info};

/// Loads configuration from layered sources.
///
/// Sources, in order of precedence (later wins):
/// 1. `{config_dir}/default.toml`
/// 2. `{config_dir}/{environment}.toml`
/// 3. `{config_dir}/local.toml` (not committed to version control)
/// 4. Environment variables with the `STRATA__` prefix
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a loader for the given configuration directory.
    #[must_use]
    pub fn new(config_dir: impl Into<String>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Creates a loader for the default location (`./config`).
    #[must_use]
    pub fn from_default_location() -> Self {
        Self::new("./config")
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<AppConfig, StrataError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("STRATA_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", self.config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("STRATA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error)?;
        let app_config: AppConfig = config.try_deserialize().map_err(config_error)?;

        Self::validate(&app_config)?;
        Ok(app_config)
    }

    /// Validates shard ids and uniqueness.
    fn validate(config: &AppConfig) -> Result<(), StrataError> {
        let mut seen = std::collections::HashSet::new();
        for shard in &config.database.shards {
            if shard.id >= 4096 {
                return Err(StrataError::configuration(format!(
                    "shard id {} out of range, only 4096 shards allowed",
                    shard.id
                )));
            }
            if !seen.insert(shard.id) {
                return Err(StrataError::configuration(format!(
                    "duplicate shard id {}",
                    shard.id
                )));
            }
        }
        Ok(())
    }
}

fn config_error(err: ConfigError) -> StrataError {
    StrataError::Configuration(err.to_string())
}
