//! API configuration module.
//!
//! Configuration is loaded from environment variables (after `.env`) with
//! fallback to defaults. Only `JWT_SECRET` is required.

use std::env;
use std::path::PathBuf;

use rx_core::checkout::TotalPolicy;
use rx_core::stock_status::ExpiryThresholds;
use rx_core::{DEFAULT_EXPIRY_CRITICAL_DAYS, DEFAULT_EXPIRY_WARNING_DAYS};

/// Minimum accepted length of `JWT_SECRET`.
pub const MIN_JWT_SECRET_LEN: usize = 16;

/// Access token lifetime: 12 hours.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 12 * 60 * 60;

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// HS256 signing secret
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    pub token_lifetime_secs: i64,

    /// Expiry warning and classifier thresholds
    pub expiry: ExpiryThresholds,

    /// How checkout treats the declared total
    pub total_policy: TotalPolicy,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                min: MIN_JWT_SECRET_LEN,
            });
        }

        let config = ApiConfig {
            port: parse_or(&lookup, "PORT", 4000)?,

            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| "./rxpos.db".to_string())
                .into(),

            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,

            jwt_secret,

            token_lifetime_secs: parse_or(&lookup, "JWT_LIFETIME_SECS", DEFAULT_TOKEN_LIFETIME_SECS)?,

            expiry: ExpiryThresholds {
                warning_days: parse_or(&lookup, "EXPIRY_WARNING_DAYS", DEFAULT_EXPIRY_WARNING_DAYS)?,
                critical_days: parse_or(&lookup, "EXPIRY_CRITICAL_DAYS", DEFAULT_EXPIRY_CRITICAL_DAYS)?,
            },

            total_policy: parse_or(&lookup, "CHECKOUT_TOTAL_POLICY", TotalPolicy::RequireMatch)?,
        };

        if config.port == 0 {
            return Err(ConfigError::InvalidValue("PORT".to_string()));
        }
        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        if config.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_LIFETIME_SECS".to_string()));
        }
        if config.expiry.warning_days < 0 || config.expiry.critical_days < 0 {
            return Err(ConfigError::InvalidValue("EXPIRY_*_DAYS".to_string()));
        }

        Ok(config)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("JWT_SECRET must be at least {min} characters")]
    WeakSecret { min: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", "a-long-enough-secret")]).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.database_path, PathBuf::from("./rxpos.db"));
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.token_lifetime_secs, 43_200);
        assert_eq!(config.expiry, ExpiryThresholds::default());
        assert_eq!(config.total_policy, TotalPolicy::RequireMatch);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("JWT_SECRET", "a-long-enough-secret"),
            ("PORT", "8080"),
            ("EXPIRY_WARNING_DAYS", "60"),
            ("CHECKOUT_TOTAL_POLICY", "TRUST"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.expiry.warning_days, 60);
        assert_eq!(config.total_policy, TotalPolicy::Trust);
    }

    #[test]
    fn test_secret_required_and_strong() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingRequired(_))));
        assert!(matches!(
            load(&[("JWT_SECRET", "short")]),
            Err(ConfigError::WeakSecret { min: 16 })
        ));
    }

    #[test]
    fn test_invalid_values() {
        let secret = ("JWT_SECRET", "a-long-enough-secret");
        assert!(matches!(load(&[secret, ("PORT", "abc")]), Err(ConfigError::InvalidValue(k)) if k == "PORT"));
        assert!(load(&[secret, ("PORT", "0")]).is_err());
        assert!(load(&[secret, ("CHECKOUT_TOTAL_POLICY", "sometimes")]).is_err());
    }
}
