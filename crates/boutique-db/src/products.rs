//! Database operations for `products` and catalog queries.

use std::collections::HashMap;

use boutique_core::{CatalogQuery, SortDirection, SortKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A product joined with its (optional) category.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ProductRow {
    pub id: i64,
    pub sku: Option<String>,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub rating: Option<Decimal>,
    pub image_url: Option<String>,
    pub image: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_friendly_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new product. `category` is the programmatic category name.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub category: Option<String>,
    pub sku: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub rating: Option<Decimal>,
    pub image_url: Option<String>,
    pub image: Option<String>,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub category: Option<String>,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub rating: Option<Decimal>,
    pub image_url: Option<String>,
    pub image: Option<String>,
}

const PRODUCT_SELECT: &str = "SELECT p.id, p.sku, p.name, p.description, p.price, p.rating, \
            p.image_url, p.image, p.category_id, \
            c.name AS category_name, c.friendly_name AS category_friendly_name, \
            p.created_at, p.updated_at \
     FROM products p \
     LEFT JOIN categories c ON c.id = p.category_id";

fn order_by(query: &CatalogQuery) -> String {
    let Some(sort) = query.sort else {
        return "p.id".to_string();
    };
    let column = match sort.key {
        SortKey::Name => "LOWER(p.name)",
        SortKey::Price => "p.price",
        SortKey::Rating => "p.rating",
        SortKey::Category => "LOWER(c.name)",
    };
    let direction = match sort.direction {
        SortDirection::Asc => "ASC NULLS LAST",
        SortDirection::Desc => "DESC NULLS LAST",
    };
    format!("{column} {direction}, p.id")
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Runs a catalog query: optional search over name or description, optional
/// category filter, optional sort.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(pool: &PgPool, query: &CatalogQuery) -> Result<Vec<ProductRow>, DbError> {
    let sql = format!(
        "{PRODUCT_SELECT} \
         WHERE ($1::text IS NULL OR p.name ILIKE $1 OR p.description ILIKE $1) \
           AND (cardinality($2::text[]) = 0 OR c.name = ANY($2)) \
         ORDER BY {}",
        order_by(query)
    );

    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(query.search_pattern())
        .bind(&query.categories)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetches a single product.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Current unit prices for the given product ids. Ids with no product are
/// simply absent from the map.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_prices(pool: &PgPool, ids: &[i64]) -> Result<HashMap<i64, Decimal>, DbError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i64, Decimal)> =
        sqlx::query_as("SELECT id, price FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().collect())
}

async fn resolve_category(pool: &PgPool, name: Option<&str>) -> Result<Option<i64>, DbError> {
    let Some(name) = name else {
        return Ok(None);
    };
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM categories WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;
    Ok(Some(id))
}

/// Inserts a product and returns it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the named category does not exist, or
/// [`DbError::Sqlx`] if the insert fails (e.g. duplicate SKU).
pub async fn create_product(pool: &PgPool, product: &NewProduct) -> Result<ProductRow, DbError> {
    let category_id = resolve_category(pool, product.category.as_deref()).await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO products \
             (category_id, sku, name, description, price, rating, image_url, image) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id",
    )
    .bind(category_id)
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.rating)
    .bind(&product.image_url)
    .bind(&product.image)
    .fetch_one(pool)
    .await?;

    get_product(pool, id).await?.ok_or(DbError::NotFound)
}

/// Applies a partial update to a product.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product or named category does not
/// exist, or [`DbError::Sqlx`] if the update fails.
pub async fn update_product(pool: &PgPool, id: i64, patch: &ProductPatch) -> Result<ProductRow, DbError> {
    let category_id = resolve_category(pool, patch.category.as_deref()).await?;

    let result = sqlx::query(
        "UPDATE products SET \
             category_id = COALESCE($2, category_id), \
             sku         = COALESCE($3, sku), \
             name        = COALESCE($4, name), \
             description = COALESCE($5, description), \
             price       = COALESCE($6, price), \
             rating      = COALESCE($7, rating), \
             image_url   = COALESCE($8, image_url), \
             image       = COALESCE($9, image), \
             updated_at  = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(category_id)
    .bind(&patch.sku)
    .bind(&patch.name)
    .bind(&patch.description)
    .bind(patch.price)
    .bind(patch.rating)
    .bind(&patch.image_url)
    .bind(&patch.image)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    get_product(pool, id).await?.ok_or(DbError::NotFound)
}

/// Deletes a product. Line items referencing it are removed by cascade.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist.
pub async fn delete_product(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boutique_core::{RawCatalogParams, SortSpec};

    #[test]
    fn unsorted_query_orders_by_id() {
        assert_eq!(order_by(&CatalogQuery::default()), "p.id");
    }

    #[test]
    fn text_keys_sort_lowercase() {
        let query = CatalogQuery {
            sort: Some(SortSpec {
                key: SortKey::Category,
                direction: SortDirection::Desc,
            }),
            ..CatalogQuery::default()
        };
        assert_eq!(order_by(&query), "LOWER(c.name) DESC NULLS LAST, p.id");
    }

    #[test]
    fn price_sort_from_params() {
        let query = CatalogQuery::from_params(&RawCatalogParams {
            sort: Some("price".to_string()),
            direction: Some("asc".to_string()),
            ..RawCatalogParams::default()
        })
        .unwrap();
        assert_eq!(order_by(&query), "p.price ASC NULLS LAST, p.id");
    }
}
