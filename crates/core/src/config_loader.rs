use crate::config::AppConfig;
use anyhow::{bail, ensure, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Default location of the TOML configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

/// Prefix for environment overrides. Nested keys use `__`.
pub const ENV_PREFIX: &str = "BASIS_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from built-in defaults, `config/Config.toml` if it
    /// exists, and `BASIS_` environment variables, in that order.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load() -> Result<AppConfig> {
        Self::extract(Self::figment(Path::new(DEFAULT_CONFIG_PATH)))
    }

    /// Loads configuration using an explicit TOML file, which must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or the
    /// result is invalid.
    pub fn load_from(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
        Self::extract(Self::figment(path))
    }

    /// Builds the layered figment without extracting it.
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract(figment: Figment) -> Result<AppConfig> {
        let config: AppConfig = figment.extract().context("failed to load configuration")?;
        Self::validate(&config)?;
        tracing::debug!(
            strategies = config.strategies.len(),
            spot = %config.spot.base_url,
            derivatives = %config.derivatives.base_url,
            "configuration loaded"
        );
        Ok(config)
    }

    fn validate(config: &AppConfig) -> Result<()> {
        let engine = &config.engine;
        ensure!(
            !engine.market_data_interval.is_zero()
                && !engine.evaluation_interval.is_zero()
                && !engine.reconciliation_interval.is_zero(),
            "engine intervals must be greater than zero"
        );
        ensure!(
            engine.max_concurrent_fetches > 0,
            "engine.max_concurrent_fetches must be greater than zero"
        );
        ensure!(
            !engine.future_symbol_suffix.is_empty(),
            "engine.future_symbol_suffix must not be empty"
        );
        for venue in [&config.spot, &config.derivatives] {
            ensure!(
                venue.requests_per_second > 0,
                "{}: requests_per_second must be greater than zero",
                venue.name
            );
        }
        Ok(())
    }
}
