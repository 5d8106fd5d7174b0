//! Schema and seed-data commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert categories and products from a catalog file
    Seed {
        /// YAML or JSON catalog file (defaults to `BOUTIQUE_CATALOG_PATH`)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub(crate) async fn run_ping(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    boutique_db::ping(pool).await?;
    println!("database: ok");
    Ok(())
}

pub(crate) async fn run_migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let applied = boutique_db::run_migrations(pool).await?;
    println!("applied {applied} migrations");
    Ok(())
}

/// Load, validate and seed the catalog. Nothing is written if the file fails
/// validation.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the upsert transaction
/// fails.
pub(crate) async fn run_seed(pool: &sqlx::PgPool, path: &Path) -> anyhow::Result<()> {
    let catalog = boutique_core::load_catalog(path)?;
    let summary = boutique_db::seed_catalog(pool, &catalog).await?;
    tracing::info!(
        path = %path.display(),
        categories = summary.categories,
        products = summary.products,
        "catalog seeded"
    );
    println!(
        "seeded {} categories and {} products from {}",
        summary.categories,
        summary.products,
        path.display()
    );
    Ok(())
}
