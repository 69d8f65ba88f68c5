//! Persistent CLI configuration.
//!
//! Loaded from `~/.config/zakat/config.toml` on Linux,
//! `~/Library/Application Support/zakat/config.toml` on macOS and
//! `%APPDATA%\zakat\config.toml` on Windows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zakat_core::{CalculationSettings, PriceDefaults, ZakatError};
use zakat_providers::{FileSystemCache, NetworkConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliConfig {
    /// Base URL of the rate feed, without the `/dbXRates/USD` path.
    pub price_feed_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Gold price per gram used when no live rate is available.
    pub gold_price: Option<Decimal>,
    /// Silver price per gram used when no live rate is available.
    pub silver_price: Option<Decimal>,
    /// Fixed Nisab threshold, applied when a form does not set its own.
    pub nisab_threshold: Option<Decimal>,
    /// Zakat rate, applied when a form does not set its own.
    pub zakat_rate: Option<Decimal>,
    /// Where fetched rates are kept. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,
    pub offline: Option<bool>,
    pub enable_logging: Option<bool>,
}

impl CliConfig {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("zakat"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Loads the default config file. A missing or broken file yields the
    /// defaults; the latter is logged.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            debug!("Could not determine config directory");
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config file found at {:?}", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<CliConfig>(&content) {
                Ok(config) => {
                    debug!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(path, content)?;
        debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Writes a sample file with every key set to its default.
    pub fn create_sample(path: &Path) -> Result<(), std::io::Error> {
        Self::sample().save_to(path)
    }

    fn sample() -> Self {
        let network = NetworkConfig::default();
        let defaults = PriceDefaults::default();
        CliConfig {
            price_feed_url: Some(network.base_url),
            timeout_seconds: Some(network.timeout_seconds),
            gold_price: Some(defaults.gold_price_per_gram),
            silver_price: Some(defaults.silver_price_per_gram),
            nisab_threshold: None,
            zakat_rate: Some(zakat_core::config::DEFAULT_ZAKAT_RATE),
            cache_dir: None,
            offline: Some(false),
            enable_logging: Some(false),
        }
    }

    pub fn network_config(&self) -> NetworkConfig {
        let mut network = NetworkConfig::default();
        if let Some(url) = &self.price_feed_url {
            network.base_url = url.clone();
        }
        if let Some(timeout) = self.timeout_seconds {
            network.timeout_seconds = timeout;
        }
        network
    }

    pub fn rate_cache(&self) -> Result<FileSystemCache, ZakatError> {
        match &self.cache_dir {
            Some(dir) => Ok(FileSystemCache::new(dir)),
            None => FileSystemCache::default_location(),
        }
    }

    /// Offline prices: explicit overrides, then this file, then the
    /// `ZAKAT_*_PRICE` environment variables, then the built-in defaults.
    pub fn price_defaults(
        &self,
        gold_override: Option<Decimal>,
        silver_override: Option<Decimal>,
    ) -> Result<PriceDefaults, ZakatError> {
        let mut defaults = PriceDefaults::from_env()?;
        if let Some(gold) = gold_override.or(self.gold_price) {
            defaults.gold_price_per_gram = gold;
        }
        if let Some(silver) = silver_override.or(self.silver_price) {
            defaults.silver_price_per_gram = silver;
        }
        defaults.validate()?;
        Ok(defaults)
    }

    /// Fills settings the form left unset. Values set in the form win.
    pub fn apply_to(&self, mut settings: CalculationSettings, defaults: PriceDefaults) -> CalculationSettings {
        if settings.nisab_threshold.is_none() {
            settings.nisab_threshold = self.nisab_threshold;
        }
        if settings.zakat_rate.is_none() {
            settings.zakat_rate = self.zakat_rate;
        }
        if settings.defaults == PriceDefaults::default() {
            settings.defaults = defaults;
        }
        settings
    }
}
