use std::collections::HashMap;

use boutique_core::CatalogFile;
use sqlx::PgPool;

use crate::DbError;

/// Rows written by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
}

/// Upsert categories and products from a catalog file.
///
/// Categories are keyed by name. Products are keyed by SKU, or by name for
/// products without one. All upserts run inside a single transaction; if any
/// operation fails the entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_catalog(pool: &PgPool, catalog: &CatalogFile) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();
    let mut category_ids: HashMap<&str, i64> = HashMap::new();

    for category in &catalog.categories {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (name, friendly_name) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET friendly_name = EXCLUDED.friendly_name \
             RETURNING id",
        )
        .bind(&category.name)
        .bind(&category.friendly_name)
        .fetch_one(&mut *tx)
        .await?;

        category_ids.insert(category.name.as_str(), id);
        summary.categories += 1;
    }

    for product in &catalog.products {
        let category_id = product
            .category
            .as_deref()
            .and_then(|name| category_ids.get(name).copied());

        let existing: Option<i64> = match product.sku.as_deref() {
            Some(sku) => {
                sqlx::query_scalar("SELECT id FROM products WHERE sku = $1")
                    .bind(sku)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT id FROM products WHERE sku IS NULL AND name = $1 LIMIT 1")
                    .bind(&product.name)
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };

        match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE products SET \
                         category_id = $2, name = $3, description = $4, price = $5, \
                         rating = $6, image_url = $7, image = $8, updated_at = NOW() \
                     WHERE id = $1",
                )
                .bind(id)
                .bind(category_id)
                .bind(&product.name)
                .bind(&product.description)
                .bind(product.price)
                .bind(product.rating)
                .bind(&product.image_url)
                .bind(&product.image)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO products \
                         (category_id, sku, name, description, price, rating, image_url, image) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                )
                .bind(category_id)
                .bind(&product.sku)
                .bind(&product.name)
                .bind(&product.description)
                .bind(product.price)
                .bind(product.rating)
                .bind(&product.image_url)
                .bind(&product.image)
                .execute(&mut *tx)
                .await?;
            }
        }

        summary.products += 1;
    }

    tx.commit().await?;
    Ok(summary)
}
