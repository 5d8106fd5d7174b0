use std::net::SocketAddr;
use std::path::PathBuf;

use rust_decimal::Decimal;

use crate::money::DeliveryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub catalog_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub free_delivery_threshold: Decimal,
    pub standard_delivery_percentage: Decimal,
    pub stripe_public_key: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_currency: String,
    pub stripe_timeout_secs: u64,
    pub webhook_tolerance_secs: i64,
    pub reconcile_attempts: u32,
    pub reconcile_backoff_ms: u64,
    pub session_ttl_days: u32,
}

impl AppConfig {
    /// Delivery pricing derived from the configured threshold and percentage.
    #[must_use]
    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            free_delivery_threshold: self.free_delivery_threshold,
            standard_delivery_percentage: self.standard_delivery_percentage,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("catalog_path", &self.catalog_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("free_delivery_threshold", &self.free_delivery_threshold)
            .field(
                "standard_delivery_percentage",
                &self.standard_delivery_percentage,
            )
            .field("stripe_public_key", &self.stripe_public_key)
            .field("stripe_secret_key", &"[redacted]")
            .field("stripe_webhook_secret", &"[redacted]")
            .field("stripe_currency", &self.stripe_currency)
            .field("stripe_timeout_secs", &self.stripe_timeout_secs)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("reconcile_attempts", &self.reconcile_attempts)
            .field("reconcile_backoff_ms", &self.reconcile_backoff_ms)
            .field("session_ttl_days", &self.session_ttl_days)
            .finish()
    }
}
