mod api;
mod middleware;
mod scheduler;
mod webhook;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(boutique_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = boutique_db::PoolConfig::from_app_config(&config);
    let pool = boutique_db::connect_pool(&config.database_url, pool_config).await?;
    boutique_db::run_migrations(&pool).await?;

    let _scheduler = scheduler::build_scheduler(pool.clone(), Arc::clone(&config)).await?;

    let stripe = boutique_stripe::StripeClient::new(
        &config.stripe_secret_key,
        config.stripe_timeout_secs,
    )?;

    let auth = AuthState::from_env(matches!(
        config.env,
        boutique_core::Environment::Development
    ))?;
    let bind_addr = config.bind_addr;
    let app = build_app(
        AppState {
            pool,
            config,
            stripe: Arc::new(stripe),
        },
        auth,
        default_rate_limit_state(),
    );

    tracing::info!(%bind_addr, "boutique server listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
