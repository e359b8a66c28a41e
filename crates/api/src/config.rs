//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `EASYCART_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `EASYCART_JWT_SECRET` - HS256 secret shared with the auth service (min 32 chars, high entropy)
//!
//! ## Optional
//! - `EASYCART_HOST` - Bind address (default: 127.0.0.1)
//! - `EASYCART_PORT` - Listen port (default: 8080)
//! - `ORDER_TIMEOUT_SECS` - Upper bound on one order placement (default: 10)
//! - `DEFAULT_SHIPPING_COUNTRY` - Country used when a checkout omits it (default: US)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_ORDER_TIMEOUT_SECS: u64 = 10;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Secret used to verify owner bearer tokens
    pub jwt_secret: SecretString,
    /// Orders settings
    pub orders: OrdersConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Order placement settings.
#[derive(Debug, Clone)]
pub struct OrdersConfig {
    /// Upper bound on one placement, transaction included
    pub timeout: Duration,
    /// Country used when the checkout form leaves it blank
    pub default_shipping_country: String,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_ORDER_TIMEOUT_SECS),
            default_shipping_country: "US".to_owned(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the JWT secret fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("EASYCART_DATABASE_URL")?;
        let host = get_env_or_default("EASYCART_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("EASYCART_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("EASYCART_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("EASYCART_PORT".to_string(), e.to_string()))?;
        let jwt_secret = get_validated_secret("EASYCART_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "EASYCART_JWT_SECRET")?;

        let orders = OrdersConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            orders,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl OrdersConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = get_env_or_default(
            "ORDER_TIMEOUT_SECS",
            &DEFAULT_ORDER_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar("ORDER_TIMEOUT_SECS".to_string(), e.to_string()))?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ORDER_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let country = get_env_or_default("DEFAULT_SHIPPING_COUNTRY", "US");
        if country.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "DEFAULT_SHIPPING_COUNTRY".to_string(),
                "cannot be blank".to_string(),
            ));
        }

        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
            default_shipping_country: country.trim().to_owned(),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
