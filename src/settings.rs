use crate::api::{FakeExchangeConfig, FillPolicy};
use crate::worker::TradingRules;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime configuration.
///
/// Layered as compiled defaults, then `Settings.toml` (or the file given on
/// the command line), then `CATS__<SECTION>__<KEY>` environment variables,
/// e.g. `CATS__TRADING__SELL_RATE=1.03`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub trading: TradingRules,
    pub driver: DriverSettings,
    pub fake: FakeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Pause after each worker tick
    pub tick_interval_ms: u64,
    /// Ceiling on one worker tick; a slower tick is abandoned
    pub tick_timeout_ms: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            tick_timeout_ms: 30_000,
        }
    }
}

impl DriverSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_millis(self.tick_timeout_ms)
    }
}

/// Paper-trading exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeSettings {
    pub fee_rate: f64,
    pub seed: Option<u64>,
    pub start_price: f64,
    pub volatility: f64,
}

impl Default for FakeSettings {
    fn default() -> Self {
        let defaults = FakeExchangeConfig::default();
        Self {
            fee_rate: defaults.fee_rate,
            seed: Some(42),
            start_price: defaults.start_price,
            volatility: defaults.volatility,
        }
    }
}

impl From<&FakeSettings> for FakeExchangeConfig {
    fn from(settings: &FakeSettings) -> Self {
        Self {
            fee_rate: settings.fee_rate,
            fill_policy: FillPolicy::OnQuery,
            seed: settings.seed,
            start_price: settings.start_price,
            volatility: settings.volatility,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from an optional `Settings.toml` in the
    /// working directory when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("Settings").required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("CATS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceUnit;

    #[test]
    fn test_defaults_match_trading_rules() {
        let settings = Settings::default();
        assert_eq!(settings.trading, TradingRules::default());
        assert_eq!(settings.driver.tick_interval(), Duration::from_secs(1));
        assert_eq!(settings.driver.tick_timeout(), Duration::from_secs(30));

        let fake = FakeExchangeConfig::from(&settings.fake);
        assert_eq!(fake.fee_rate, 0.0005);
        assert_eq!(fake.fill_policy, FillPolicy::OnQuery);
        assert!(fake.seed.is_some());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("cats-settings-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
[trading]
sell_rate = 1.05
price_unit = "minute"

[driver]
tick_interval_ms = 250
tick_timeout_ms = 5000

[fake]
seed = 7
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.trading.sell_rate, 1.05);
        assert_eq!(settings.trading.price_unit, PriceUnit::Minute);
        assert_eq!(settings.trading.additional_buy_rate, 0.97);
        assert_eq!(settings.driver.tick_interval_ms, 250);
        assert_eq!(settings.driver.tick_timeout(), Duration::from_secs(5));
        assert_eq!(settings.fake.seed, Some(7));
        assert_eq!(settings.fake.fee_rate, 0.0005);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("cats-settings-does-not-exist.toml");
        assert!(Settings::load(Some(path.as_path())).is_err());
    }
}
