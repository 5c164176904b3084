//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::Secret;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string (unset: in-memory store)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `PAYMENT_GATEWAY_URL`: provider base URL (unset: in-memory gateway)
/// - `PAYMENT_KEY_ID` / `PAYMENT_KEY_SECRET`: provider credentials; the
///   secret also keys completion signatures and is required at startup
/// - `PAYMENT_GATEWAY_TIMEOUT_MS`: provider request timeout (default: `10000`)
/// - `PAYMENT_CURRENCY`: currency for intents that name none (default: `"INR"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<Secret<String>>,
    pub database_max_connections: u32,
    pub payment_gateway_url: Option<String>,
    pub payment_key_id: String,
    pub payment_key_secret: Secret<String>,
    pub payment_gateway_timeout: Duration,
    pub payment_currency: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL").map(Secret::new),
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            payment_gateway_url: non_empty("PAYMENT_GATEWAY_URL"),
            payment_key_id: non_empty("PAYMENT_KEY_ID").unwrap_or(defaults.payment_key_id),
            payment_key_secret: non_empty("PAYMENT_KEY_SECRET")
                .map(Secret::new)
                .unwrap_or(defaults.payment_key_secret),
            payment_gateway_timeout: non_empty("PAYMENT_GATEWAY_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_gateway_timeout),
            payment_currency: non_empty("PAYMENT_CURRENCY").unwrap_or(defaults.payment_currency),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            payment_gateway_url: None,
            payment_key_id: String::new(),
            payment_key_secret: Secret::default(),
            payment_gateway_timeout: Duration::from_millis(10_000),
            payment_currency: "INR".to_string(),
        }
    }
}
