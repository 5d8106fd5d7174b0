mod catalog;
mod db;
mod orders;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::catalog::CatalogCommands;
use crate::db::DbCommands;
use crate::orders::OrderCommands;

#[derive(Debug, Parser)]
#[command(name = "boutique-cli")]
#[command(about = "Boutique storefront maintenance")]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Schema and seed data
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Browse the catalog as the storefront sees it
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Inspect placed orders
    Orders {
        #[command(subcommand)]
        command: OrderCommands,
    },
    /// Bag session housekeeping
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Debug, Subcommand)]
enum SessionCommands {
    /// Delete bag sessions idle for longer than the TTL
    Purge {
        #[arg(long, env = "BOUTIQUE_SESSION_TTL_DAYS", default_value = "14")]
        ttl_days: u32,
    },
}

/// Default seed file location, overridable with `--path`.
fn default_catalog_path() -> PathBuf {
    std::env::var("BOUTIQUE_CATALOG_PATH")
        .map_or_else(|_| PathBuf::from("./config/catalog.yaml"), PathBuf::from)
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<sqlx::PgPool> {
    let url = database_url
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required; pass --database-url or set it"))?;
    let pool = boutique_db::connect_pool(url, boutique_db::PoolConfig::default()).await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("boutique-cli: run with --help to list commands");
        return Ok(());
    };

    let pool = connect(cli.database_url.as_deref()).await?;
    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => db::run_ping(&pool).await?,
            DbCommands::Migrate => db::run_migrate(&pool).await?,
            DbCommands::Seed { path } => {
                let path = path.unwrap_or_else(default_catalog_path);
                db::run_seed(&pool, &path).await?;
            }
        },
        Commands::Catalog { command } => match command {
            CatalogCommands::List {
                q,
                category,
                sort,
                direction,
            } => {
                let params = boutique_core::RawCatalogParams {
                    q,
                    category,
                    sort,
                    direction,
                };
                catalog::run_list(&pool, &params).await?;
            }
            CatalogCommands::Categories => catalog::run_categories(&pool).await?,
        },
        Commands::Orders { command } => match command {
            OrderCommands::Show { order_number } => orders::run_show(&pool, &order_number).await?,
            OrderCommands::History { username } => orders::run_history(&pool, &username).await?,
        },
        Commands::Sessions {
            command: SessionCommands::Purge { ttl_days },
        } => {
            let purged = boutique_db::purge_stale_sessions(&pool, ttl_days).await?;
            println!("purged {purged} sessions idle for more than {ttl_days} days");
        }
    }

    Ok(())
}
