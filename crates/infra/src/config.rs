//! Environment-driven configuration for the stock core.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockConfig {
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub tx_max_attempts: u32,
    pub tx_backoff: Duration,
    pub lock_timeout: Duration,
    pub billing_default_writable: bool,
    pub redis_url: Option<String>,
    pub idempotency_ttl: Duration,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: 10,
            tx_max_attempts: 3,
            tx_backoff: Duration::from_millis(25),
            lock_timeout: Duration::from_millis(2_000),
            billing_default_writable: false,
            redis_url: None,
            idempotency_ttl: Duration::from_secs(86_400),
        }
    }
}

impl StockConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults;
    /// set-but-invalid values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            use_persistent_stores: flag(text("USE_PERSISTENT_STORES"), "USE_PERSISTENT_STORES")?
                .unwrap_or(defaults.use_persistent_stores),
            database_url: text("DATABASE_URL"),
            database_max_connections: number(
                text("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
            )?
            .unwrap_or(defaults.database_max_connections),
            tx_max_attempts: number(text("STOCK_TX_MAX_ATTEMPTS"), "STOCK_TX_MAX_ATTEMPTS")?
                .unwrap_or(defaults.tx_max_attempts),
            tx_backoff: number(text("STOCK_TX_BACKOFF_MS"), "STOCK_TX_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.tx_backoff),
            lock_timeout: number(text("STOCK_LOCK_TIMEOUT_MS"), "STOCK_LOCK_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            billing_default_writable: flag(
                text("BILLING_DEFAULT_WRITABLE"),
                "BILLING_DEFAULT_WRITABLE",
            )?
            .unwrap_or(defaults.billing_default_writable),
            redis_url: text("REDIS_URL"),
            idempotency_ttl: number(text("IDEMPOTENCY_TTL_SECS"), "IDEMPOTENCY_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.idempotency_ttl),
        };

        if config.tx_max_attempts == 0 {
            return Err(anyhow!("STOCK_TX_MAX_ATTEMPTS must be at least 1"));
        }
        if config.database_max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }
        if config.use_persistent_stores && config.database_url.is_none() {
            return Err(anyhow!("DATABASE_URL is required when USE_PERSISTENT_STORES is enabled"));
        }
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.tx_max_attempts, self.tx_backoff)
    }
}

fn number<T>(value: Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|v| {
            v.parse::<T>()
                .with_context(|| format!("{key} must be a non-negative integer (got '{v}')"))
        })
        .transpose()
}

fn flag(value: Option<String>, key: &str) -> anyhow::Result<Option<bool>> {
    value
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("{key} must be a boolean (got '{v}')")),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> anyhow::Result<StockConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StockConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn unset_keys_take_defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config, StockConfig::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn values_are_parsed() {
        let config = from(&[
            ("STOCK_TX_MAX_ATTEMPTS", "5"),
            ("STOCK_TX_BACKOFF_MS", "10"),
            ("STOCK_LOCK_TIMEOUT_MS", "150"),
            ("BILLING_DEFAULT_WRITABLE", "true"),
        ])
        .unwrap();
        assert_eq!(config.tx_max_attempts, 5);
        assert_eq!(config.tx_backoff, Duration::from_millis(10));
        assert_eq!(config.lock_timeout, Duration::from_millis(150));
        assert!(config.billing_default_writable);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(from(&[("STOCK_TX_MAX_ATTEMPTS", "three")]).is_err());
        assert!(from(&[("STOCK_TX_MAX_ATTEMPTS", "0")]).is_err());
        assert!(from(&[("USE_PERSISTENT_STORES", "maybe")]).is_err());
        assert!(from(&[("USE_PERSISTENT_STORES", "true")]).is_err());
    }
}
