// Runtime settings: built-in defaults, then an optional TOML file, then
// `PREDLOB_*` environment variables.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::registry::MarketRegistry;
use crate::engine::types::{LadderError, DEFAULT_TICK_SIZE};

pub const DEFAULT_CONFIG_FILE: &str = "predlob.toml";
const ENV_PREFIX: &str = "PREDLOB";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Tick(#[from] LadderError),
    #[error("feed_channel_capacity must be at least 1")]
    ZeroChannelCapacity,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// Tick size applied to every newly initialised market.
    pub default_tick_size: f64,
    pub log_filter: String,
    /// Bound of the feed -> router channel; must be nonzero.
    pub feed_channel_capacity: usize,
    /// Prometheus listener, only used with the `metrics-exporter` feature.
    pub metrics_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_tick_size: DEFAULT_TICK_SIZE,
            log_filter: "info".to_string(),
            feed_channel_capacity: 1024,
            metrics_port: 9000,
        }
    }
}

impl Settings {
    /// `path` is optional on disk; a missing file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Settings::default();
        let file = path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        config::Config::builder()
            .set_default("default_tick_size", defaults.default_tick_size)?
            .set_default("log_filter", defaults.log_filter)?
            .set_default("feed_channel_capacity", defaults.feed_channel_capacity as i64)?
            .set_default("metrics_port", defaults.metrics_port as i64)?
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.feed_channel_capacity == 0 {
            return Err(SettingsError::ZeroChannelCapacity);
        }
        MarketRegistry::with_default_tick(self.default_tick_size)?;
        Ok(())
    }

    pub fn registry(&self) -> Result<MarketRegistry, LadderError> {
        MarketRegistry::with_default_tick(self.default_tick_size)
    }
}
