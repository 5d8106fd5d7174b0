//! Database operations for `categories`.

use sqlx::PgPool;

use crate::DbError;

/// A row from the `categories` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct CategoryRow {
    pub id: i64,
    /// Programmatic name, e.g. `bed_bath`.
    pub name: String,
    pub friendly_name: Option<String>,
}

/// Returns all categories ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, friendly_name FROM categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Creates a category, or updates the friendly name if it already exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn create_category(
    pool: &PgPool,
    name: &str,
    friendly_name: Option<&str>,
) -> Result<CategoryRow, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "INSERT INTO categories (name, friendly_name) VALUES ($1, $2) \
         ON CONFLICT (name) DO UPDATE SET friendly_name = EXCLUDED.friendly_name \
         RETURNING id, name, friendly_name",
    )
    .bind(name)
    .bind(friendly_name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Deletes a category by name. Products in it keep existing with no category.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no category has that name.
pub async fn delete_category(pool: &PgPool, name: &str) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM categories WHERE name = $1")
        .bind(name)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
