use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::services::{MonitorConfig, ProviderConfig};
use crate::sources::alphavantage::ALPHA_VANTAGE_URL;
use crate::types::DEFAULT_USER_ID;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file.
    pub database_path: String,
    /// Alpha Vantage API keys, rotated round-robin.
    pub alpha_vantage_keys: Vec<String>,
    /// Alpha Vantage endpoint.
    pub alpha_vantage_url: String,
    /// Feed request timeout (seconds).
    pub feed_timeout_secs: u64,
    /// Pending order sweep interval (seconds).
    pub order_monitor_interval_secs: u64,
    /// Held-symbol price refresh interval (seconds, 0 = disabled).
    pub price_refresh_interval_secs: u64,
    /// User whose account is opened at startup.
    pub default_user_id: String,
    /// Opening balance for the default user's account.
    pub initial_cash: Decimal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "paper_ledger.db".to_string(),
            alpha_vantage_keys: Vec::new(),
            alpha_vantage_url: ALPHA_VANTAGE_URL.to_string(),
            feed_timeout_secs: 10,
            order_monitor_interval_secs: 30,
            price_refresh_interval_secs: 60,
            default_user_id: DEFAULT_USER_ID.to_string(),
            initial_cash: dec!(10000.00),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unset or unparsable values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            // Format: "KEY1,KEY2,KEY3"
            alpha_vantage_keys: lookup("ALPHA_VANTAGE_KEY")
                .map(|s| {
                    s.split(',')
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            alpha_vantage_url: lookup("ALPHA_VANTAGE_URL").unwrap_or(defaults.alpha_vantage_url),
            feed_timeout_secs: parsed("FEED_TIMEOUT_SECS").unwrap_or(defaults.feed_timeout_secs),
            order_monitor_interval_secs: parsed("ORDER_MONITOR_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.order_monitor_interval_secs),
            price_refresh_interval_secs: parsed("PRICE_REFRESH_INTERVAL_SECS")
                .unwrap_or(defaults.price_refresh_interval_secs),
            default_user_id: lookup("DEFAULT_USER_ID")
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.default_user_id),
            initial_cash: lookup("INITIAL_CASH")
                .and_then(|v| Decimal::from_str(v.trim()).ok())
                .filter(|cash| *cash >= Decimal::ZERO)
                .unwrap_or(defaults.initial_cash),
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::with_credentials(self.alpha_vantage_keys.iter().cloned())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.order_monitor_interval_secs),
        }
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    /// Refresh interval, or `None` when the refresher is disabled.
    pub fn price_refresh_interval(&self) -> Option<Duration> {
        (self.price_refresh_interval_secs > 0)
            .then(|| Duration::from_secs(self.price_refresh_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.database_path, "paper_ledger.db");
        assert!(config.alpha_vantage_keys.is_empty());
        assert_eq!(config.alpha_vantage_url, ALPHA_VANTAGE_URL);
        assert_eq!(config.order_monitor_interval_secs, 30);
        assert_eq!(config.default_user_id, "default_user");
        assert_eq!(config.initial_cash, dec!(10000.00));
        assert_eq!(config.price_refresh_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_key_list_is_split_and_trimmed() {
        let config = config_from(&[("ALPHA_VANTAGE_KEY", "KEY1, KEY2,,KEY3 ")]);
        assert_eq!(config.alpha_vantage_keys, vec!["KEY1", "KEY2", "KEY3"]);
        assert_eq!(config.provider_config().credentials.len(), 3);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = config_from(&[
            ("ORDER_MONITOR_INTERVAL_SECS", "5"),
            ("PRICE_REFRESH_INTERVAL_SECS", "0"),
            ("FEED_TIMEOUT_SECS", "soon"),
            ("INITIAL_CASH", "2500.50"),
        ]);
        assert_eq!(config.monitor_config().interval, Duration::from_secs(5));
        assert_eq!(config.price_refresh_interval(), None);
        assert_eq!(config.feed_timeout(), Duration::from_secs(10));
        assert_eq!(config.initial_cash, dec!(2500.50));
    }

    #[test]
    fn test_zero_monitor_interval_keeps_default() {
        let config = config_from(&[("ORDER_MONITOR_INTERVAL_SECS", "0"), ("INITIAL_CASH", "-1")]);
        assert_eq!(config.order_monitor_interval_secs, 30);
        assert_eq!(config.initial_cash, dec!(10000.00));
    }
}
