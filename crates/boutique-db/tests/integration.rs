//! Offline tests for boutique-db pool configuration and row types.
//! These tests do not require a live database connection.

use boutique_core::{AppConfig, Environment, OrderTotals};
use boutique_db::{OrderMatch, OrderRow, PoolConfig, SessionState};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        catalog_path: PathBuf::from("./config/catalog.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        free_delivery_threshold: Decimal::new(50, 0),
        standard_delivery_percentage: Decimal::new(10, 0),
        stripe_public_key: "pk_test".to_string(),
        stripe_secret_key: "sk_test".to_string(),
        stripe_webhook_secret: "whsec".to_string(),
        stripe_currency: "usd".to_string(),
        stripe_timeout_secs: 30,
        webhook_tolerance_secs: 300,
        reconcile_attempts: 5,
        reconcile_backoff_ms: 1000,
        session_ttl_days: 14,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn order_row_exposes_totals() {
    let row = OrderRow {
        id: 1,
        order_number: "0123456789ABCDEF0123456789ABCDEF".to_string(),
        user_profile_id: None,
        full_name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone_number: "0123".to_string(),
        country: "GB".to_string(),
        postcode: None,
        town_or_city: "London".to_string(),
        street_address1: "1 Analytical Row".to_string(),
        street_address2: None,
        county: None,
        date: chrono::Utc::now(),
        delivery_cost: Decimal::new(400, 2),
        order_total: Decimal::new(4000, 2),
        grand_total: Decimal::new(4400, 2),
        original_bag: r#"{"1":2}"#.to_string(),
        stripe_pid: "pi_123".to_string(),
    };

    assert_eq!(
        row.totals(),
        OrderTotals {
            order_total: Decimal::new(4000, 2),
            delivery_cost: Decimal::new(400, 2),
            grand_total: Decimal::new(4400, 2),
        }
    );
}

#[test]
fn empty_session_state_has_empty_bag() {
    let state = SessionState::default();
    assert!(state.bag.is_empty());
    assert!(!state.save_info);
}

#[test]
fn order_match_defaults_to_null_fields() {
    let criteria = OrderMatch::default();
    assert!(criteria.full_name.is_none());
    assert!(criteria.county.is_none());
    assert_eq!(criteria.grand_total, Decimal::ZERO);
}
