//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use bazaar_domain::{PlatformSettings, PricingPolicy, DEFAULT_DELIVERY_DAYS, DEFAULT_RETURN_WINDOW_DAYS};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Commerce core configuration
    pub commerce: CommerceConfig,

    /// PostgreSQL connection string (postgres builds only)
    pub database_url: Option<String>,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Settings handed to the commerce core at startup.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Returns toggle and default window
    pub platform: PlatformSettings,
    /// Checkout pricing
    pub pricing: PricingPolicy,
    /// Bound on a single customer notification
    pub notify_timeout: Duration,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (in-memory store)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Ok(Self {
            environment: Self::load_environment()?,
            api: Self::load_api_config()?,
            commerce: Self::load_commerce_config()?,
            database_url: env::var("DATABASE_URL").ok(),
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            commerce: CommerceConfig::default(),
            database_url: None,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("BAZAAR_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid BAZAAR_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("BAZAAR_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = Self::load_parsed_env("BAZAAR_API_PORT", 8080u16)?;

        Ok(ApiConfig { host, port })
    }

    fn load_commerce_config() -> DaemonResult<CommerceConfig> {
        let defaults = CommerceConfig::default();

        let platform = PlatformSettings {
            returns_enabled: Self::load_parsed_env("BAZAAR_RETURNS_ENABLED", defaults.platform.returns_enabled)?,
            default_return_window_days: Self::load_parsed_env(
                "BAZAAR_RETURN_WINDOW_DAYS",
                DEFAULT_RETURN_WINDOW_DAYS,
            )?,
        };

        let pricing = PricingPolicy {
            tax_rate: Self::load_decimal_env("BAZAAR_TAX_RATE", defaults.pricing.tax_rate)?,
            free_shipping_threshold: Self::load_decimal_env(
                "BAZAAR_FREE_SHIPPING_THRESHOLD",
                defaults.pricing.free_shipping_threshold,
            )?,
            shipping_fee: Self::load_decimal_env("BAZAAR_SHIPPING_FEE", defaults.pricing.shipping_fee)?,
            default_delivery_days: Self::load_parsed_env("BAZAAR_DEFAULT_DELIVERY_DAYS", DEFAULT_DELIVERY_DAYS)?,
        };

        let notify_ms = Self::load_parsed_env("BAZAAR_NOTIFY_TIMEOUT_MS", defaults.notify_timeout.as_millis() as u64)?;

        Ok(CommerceConfig {
            platform,
            pricing,
            notify_timeout: Duration::from_millis(notify_ms),
        })
    }

    fn load_decimal_env(key: &str, default: Decimal) -> DaemonResult<Decimal> {
        match env::var(key) {
            Ok(val) => {
                let value = Decimal::from_str(&val)
                    .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val)))?;
                if value.is_sign_negative() {
                    return Err(DaemonError::Config(format!("{} must not be negative: {}", key, val)));
                }
                Ok(value)
            },
            Err(_) => Ok(default),
        }
    }

    fn load_parsed_env<T: FromStr>(key: &str, default: T) -> DaemonResult<T> {
        match env::var(key) {
            Ok(val) => val
                .trim()
                .parse::<T>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            commerce: CommerceConfig::default(),
            database_url: None,
            environment: Environment::Development,
        }
    }
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            platform: PlatformSettings::default(),
            pricing: PricingPolicy::default(),
            notify_timeout: bazaar_exec::DEFAULT_NOTIFY_TIMEOUT,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.environment, Environment::Test);
    }

    #[test]
    fn test_commerce_config_defaults() {
        let config = Config::default();

        assert!(config.commerce.platform.returns_enabled);
        assert_eq!(config.commerce.platform.default_return_window_days, 7);
        assert_eq!(config.commerce.pricing.tax_rate, dec!(0.15));
        assert_eq!(config.commerce.pricing.free_shipping_threshold, dec!(100));
        assert_eq!(config.commerce.pricing.shipping_fee, dec!(10));
        assert_eq!(config.commerce.notify_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
