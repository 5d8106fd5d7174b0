use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    let stripe_secret_key = require("STRIPE_SECRET_KEY")?;
    let stripe_webhook_secret = require("STRIPE_WH_SECRET")?;

    let env = parse_environment(&or_default("BOUTIQUE_ENV", "development"))?;

    let bind_addr: SocketAddr = parsed(
        "BOUTIQUE_BIND_ADDR",
        &or_default("BOUTIQUE_BIND_ADDR", "0.0.0.0:3000"),
    )?;
    let log_level = or_default("BOUTIQUE_LOG_LEVEL", "info");
    let catalog_path = PathBuf::from(or_default(
        "BOUTIQUE_CATALOG_PATH",
        "./config/catalog.yaml",
    ));

    let db_max_connections: u32 = parsed(
        "BOUTIQUE_DB_MAX_CONNECTIONS",
        &or_default("BOUTIQUE_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections: u32 = parsed(
        "BOUTIQUE_DB_MIN_CONNECTIONS",
        &or_default("BOUTIQUE_DB_MIN_CONNECTIONS", "1"),
    )?;
    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "BOUTIQUE_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }
    let db_acquire_timeout_secs: u64 = parsed(
        "BOUTIQUE_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("BOUTIQUE_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;

    let free_delivery_threshold: Decimal = parsed(
        "BOUTIQUE_FREE_DELIVERY_THRESHOLD",
        &or_default("BOUTIQUE_FREE_DELIVERY_THRESHOLD", "50"),
    )?;
    let standard_delivery_percentage: Decimal = parsed(
        "BOUTIQUE_STANDARD_DELIVERY_PERCENTAGE",
        &or_default("BOUTIQUE_STANDARD_DELIVERY_PERCENTAGE", "10"),
    )?;
    if free_delivery_threshold.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar {
            var: "BOUTIQUE_FREE_DELIVERY_THRESHOLD".to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    if standard_delivery_percentage.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar {
            var: "BOUTIQUE_STANDARD_DELIVERY_PERCENTAGE".to_string(),
            reason: "must not be negative".to_string(),
        });
    }

    let stripe_public_key = or_default("STRIPE_PUBLIC_KEY", "");
    let stripe_currency = or_default("STRIPE_CURRENCY", "usd").to_lowercase();
    let stripe_timeout_secs: u64 = parsed(
        "BOUTIQUE_STRIPE_TIMEOUT_SECS",
        &or_default("BOUTIQUE_STRIPE_TIMEOUT_SECS", "30"),
    )?;
    let webhook_tolerance_secs: i64 = parsed(
        "BOUTIQUE_WEBHOOK_TOLERANCE_SECS",
        &or_default("BOUTIQUE_WEBHOOK_TOLERANCE_SECS", "300"),
    )?;
    let reconcile_attempts: u32 = parsed(
        "BOUTIQUE_RECONCILE_ATTEMPTS",
        &or_default("BOUTIQUE_RECONCILE_ATTEMPTS", "5"),
    )?;
    if reconcile_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "BOUTIQUE_RECONCILE_ATTEMPTS".to_string(),
            reason: "at least one lookup attempt is required".to_string(),
        });
    }
    let reconcile_backoff_ms: u64 = parsed(
        "BOUTIQUE_RECONCILE_BACKOFF_MS",
        &or_default("BOUTIQUE_RECONCILE_BACKOFF_MS", "1000"),
    )?;
    let session_ttl_days: u32 = parsed(
        "BOUTIQUE_SESSION_TTL_DAYS",
        &or_default("BOUTIQUE_SESSION_TTL_DAYS", "14"),
    )?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        catalog_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        free_delivery_threshold,
        standard_delivery_percentage,
        stripe_public_key,
        stripe_secret_key,
        stripe_webhook_secret,
        stripe_currency,
        stripe_timeout_secs,
        webhook_tolerance_secs,
        reconcile_attempts,
        reconcile_backoff_ms,
        session_ttl_days,
    })
}

fn parsed<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BOUTIQUE_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
