use boutique_core::{CatalogQuery, RawCatalogParams};
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum CatalogCommands {
    /// List products with the storefront's search, filter and sort rules
    List {
        /// Search term matched against name and description
        #[arg(long)]
        q: Option<String>,
        /// Comma-separated category names
        #[arg(long)]
        category: Option<String>,
        /// price, rating, name or category
        #[arg(long)]
        sort: Option<String>,
        /// asc or desc
        #[arg(long)]
        direction: Option<String>,
    },
    /// List categories
    Categories,
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_owned()
    }
}

pub(crate) async fn run_list(pool: &sqlx::PgPool, params: &RawCatalogParams) -> anyhow::Result<()> {
    let query = CatalogQuery::from_params(params)?;
    let products = boutique_db::list_products(pool, &query).await?;

    if products.is_empty() {
        println!("no products match; run `db seed` to load the catalog");
        return Ok(());
    }

    println!("sorting: {}", query.current_sorting());
    println!("{:<7}{:<10}{:<8}{:<16}NAME", "ID", "PRICE", "RATING", "CATEGORY");
    for product in &products {
        let rating = product
            .rating
            .map_or_else(|| "-".to_string(), |r| r.to_string());
        let category = product.category_name.as_deref().unwrap_or("-");
        println!(
            "{:<7}{:<10}{:<8}{:<16}{}",
            product.id,
            product.price,
            rating,
            category,
            truncate(&product.name, 50)
        );
    }

    Ok(())
}

pub(crate) async fn run_categories(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = boutique_db::list_categories(pool).await?;
    for category in &categories {
        println!(
            "{:<20}{}",
            category.name,
            category.friendly_name.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
