//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUNDRIFT_BACKEND_URL` - Base URL of the REST backend
//! - `SUNDRIFT_BACKEND_API_KEY` - API key sent with every backend request
//!
//! ## Optional
//! - `SUNDRIFT_FREE_DELIVERY_THRESHOLD` - Subtotal at which shipping is free (default: 500)
//! - `SUNDRIFT_FLAT_SHIPPING_FEE` - Fee below the threshold (default: 50)
//! - `SUNDRIFT_TAX_RATE` - Checkout-stage tax rate (default: 0.05)
//! - `SUNDRIFT_GUEST_CART_PATH` - Guest cart record path (default: .sundrift/guest_cart.json)
//! - `SUNDRIFT_CART_PERSIST_COOLDOWN_MS` - Persist suppression window after
//!   sign-in reconciliation (default: 400)
//! - `SUNDRIFT_OTP_RESEND_COOLDOWN_SECS` - Base OTP resend cooldown (default: 60)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use sundrift_core::Money;

use crate::pricing::PricingPolicy;

/// Minimum length of the backend API key.
const MIN_API_KEY_LENGTH: usize = 16;

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
    "insert",
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

/// Storefront engine configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend connection settings.
    pub backend: BackendConfig,
    /// Shipping and tax policy.
    pub pricing: PricingPolicy,
    /// Cart persistence settings.
    pub cart: CartConfig,
    /// Checkout timing settings.
    pub checkout: CheckoutConfig,
}

/// REST backend connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL all endpoint paths are joined onto. Always ends with a
    /// slash.
    pub base_url: Url,
    /// API key sent on every request.
    pub api_key: SecretString,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Cart persistence settings.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Where the guest cart record lives.
    pub guest_cart_path: PathBuf,
    /// How long local persistence stays suppressed after a sign-in
    /// reconciliation settles.
    pub persist_cooldown: Duration,
}

/// Checkout timing settings.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Base OTP resend cooldown; the nth resend waits `base * (n + 1)`.
    pub otp_resend_cooldown: Duration,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key fails validation (length, placeholder detection).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url("SUNDRIFT_BACKEND_URL", &get_required_env("SUNDRIFT_BACKEND_URL")?)?;
        let api_key = get_validated_api_key("SUNDRIFT_BACKEND_API_KEY")?;

        let pricing = PricingPolicy {
            free_delivery_threshold: Money::new(get_decimal_or_default(
                "SUNDRIFT_FREE_DELIVERY_THRESHOLD",
                "500",
            )?),
            flat_shipping_fee: Money::new(get_decimal_or_default(
                "SUNDRIFT_FLAT_SHIPPING_FEE",
                "50",
            )?),
            tax_rate: get_decimal_or_default("SUNDRIFT_TAX_RATE", "0.05")?,
        };

        let cart = CartConfig {
            guest_cart_path: PathBuf::from(get_env_or_default(
                "SUNDRIFT_GUEST_CART_PATH",
                ".sundrift/guest_cart.json",
            )),
            persist_cooldown: Duration::from_millis(get_u64_or_default(
                "SUNDRIFT_CART_PERSIST_COOLDOWN_MS",
                "400",
            )?),
        };

        let checkout = CheckoutConfig {
            otp_resend_cooldown: Duration::from_secs(get_u64_or_default(
                "SUNDRIFT_OTP_RESEND_COOLDOWN_SECS",
                "60",
            )?),
        };

        Ok(Self {
            backend: BackendConfig { base_url, api_key },
            pricing,
            cart,
            checkout,
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

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a decimal environment variable with a default value.
fn get_decimal_or_default(key: &str, default: &str) -> Result<Decimal, ConfigError> {
    let raw = get_env_or_default(key, default);
    Decimal::from_str(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get an integer environment variable with a default value.
fn get_u64_or_default(key: &str, default: &str) -> Result<u64, ConfigError> {
    let raw = get_env_or_default(key, default);
    raw.parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a base URL, appending a trailing slash so endpoint joins work.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that the API key is not a placeholder and is long enough.
fn validate_api_key(key: &str, var_name: &str) -> Result<(), ConfigError> {
    if key.len() < MIN_API_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_API_KEY_LENGTH,
                key.len()
            ),
        ));
    }

    let lower = key.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Load and validate the API key from environment.
fn get_validated_api_key(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_api_key(&value, key)?;
    Ok(SecretString::from(value))
}
