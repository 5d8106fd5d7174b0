//! Database operations for `orders` and `order_line_items`.
//!
//! Every line-item insert or delete runs in its own transaction together with
//! [`recompute_order_totals`], which locks the order row first. The stored
//! totals therefore always agree with the lines. `order_number` is written
//! once on insert; no statement here updates it.

use boutique_core::{
    Bag, CoreError, CustomerDetails, DeliveryPolicy, LineRequest, OrderNumber, OrderTotals,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderRow {
    pub id: i64,
    pub order_number: String,
    pub user_profile_id: Option<i64>,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    pub postcode: Option<String>,
    pub town_or_city: String,
    pub street_address1: String,
    pub street_address2: Option<String>,
    pub county: Option<String>,
    pub date: DateTime<Utc>,
    pub delivery_cost: Decimal,
    pub order_total: Decimal,
    pub grand_total: Decimal,
    pub original_bag: String,
    pub stripe_pid: String,
}

impl OrderRow {
    #[must_use]
    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            order_total: self.order_total,
            delivery_cost: self.delivery_cost,
            grand_total: self.grand_total,
        }
    }
}

/// A line item joined with its product's name and SKU.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct LineItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub product_size: Option<String>,
    pub quantity: i32,
    pub lineitem_total: Decimal,
}

/// Everything needed to write a new order row.
#[derive(Debug, Clone, Copy)]
pub struct NewOrder<'a> {
    pub details: &'a CustomerDetails,
    pub user_profile_id: Option<i64>,
    /// Canonical bag snapshot the order was built from.
    pub original_bag: &'a str,
    pub stripe_pid: &'a str,
}

/// Criteria for finding an order already written by checkout. Text fields
/// compare case-insensitively and `None` matches SQL `NULL`; the money,
/// bag snapshot and payment-intent id compare exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderMatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub town_or_city: Option<String>,
    pub street_address1: Option<String>,
    pub street_address2: Option<String>,
    pub county: Option<String>,
    pub grand_total: Decimal,
    pub original_bag: String,
    pub stripe_pid: String,
}

const ORDER_COLUMNS: &str = "id, order_number, user_profile_id, full_name, email, phone_number, \
     country, postcode, town_or_city, street_address1, street_address2, county, date, \
     delivery_cost, order_total, grand_total, original_bag, stripe_pid";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts an order with zero totals and a freshly generated order number.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_order_row(pool: &PgPool, order: &NewOrder<'_>) -> Result<OrderRow, DbError> {
    let details = order.details;
    let address = &details.address;

    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO orders \
             (order_number, user_profile_id, full_name, email, phone_number, country, \
              postcode, town_or_city, street_address1, street_address2, county, \
              original_bag, stripe_pid) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(OrderNumber::generate().as_str())
    .bind(order.user_profile_id)
    .bind(&details.full_name)
    .bind(&details.email)
    .bind(&details.phone_number)
    .bind(&address.country)
    .bind(&address.postcode)
    .bind(&address.town_or_city)
    .bind(&address.street_address1)
    .bind(&address.street_address2)
    .bind(&address.county)
    .bind(order.original_bag)
    .bind(order.stripe_pid)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Recomputes and stores an order's totals from its current line items.
///
/// Callers must hold the order row lock (`SELECT ... FOR UPDATE`) in the same
/// transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either statement fails.
pub async fn recompute_order_totals(
    conn: &mut PgConnection,
    order_id: i64,
    policy: &DeliveryPolicy,
) -> Result<OrderTotals, DbError> {
    let line_totals: Vec<Decimal> =
        sqlx::query_scalar("SELECT lineitem_total FROM order_line_items WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

    let totals = OrderTotals::compute(line_totals, policy);

    sqlx::query(
        "UPDATE orders SET order_total = $2, delivery_cost = $3, grand_total = $4 \
         WHERE id = $1",
    )
    .bind(order_id)
    .bind(totals.order_total)
    .bind(totals.delivery_cost)
    .bind(totals.grand_total)
    .execute(&mut *conn)
    .await?;

    Ok(totals)
}

async fn lock_order(conn: &mut PgConnection, order_id: i64) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(DbError::NotFound)?;
    Ok(())
}

/// Adds one line item priced at the product's current price and updates the
/// order totals, atomically.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the order does not exist.
/// - [`DbError::ProductMissing`] if the product does not exist.
/// - [`DbError::Sqlx`] on any database failure.
pub async fn add_line_item(
    pool: &PgPool,
    order_id: i64,
    line: &LineRequest,
    policy: &DeliveryPolicy,
) -> Result<OrderTotals, DbError> {
    let quantity = i32::try_from(line.quantity).map_err(|_| CoreError::InvalidQuantity {
        got: i64::from(line.quantity),
        max: i32::MAX.unsigned_abs(),
    })?;

    let mut tx = pool.begin().await?;
    lock_order(&mut tx, order_id).await?;

    let price = sqlx::query_scalar::<_, Decimal>("SELECT price FROM products WHERE id = $1")
        .bind(line.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::ProductMissing(line.product_id))?;

    sqlx::query(
        "INSERT INTO order_line_items \
             (order_id, product_id, product_size, quantity, lineitem_total) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(&line.size)
    .bind(quantity)
    .bind(line.line_total(price))
    .execute(&mut *tx)
    .await?;

    let totals = recompute_order_totals(&mut tx, order_id, policy).await?;
    tx.commit().await?;

    Ok(totals)
}

/// Removes a line item and updates its order's totals, atomically.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the line item does not exist, or
/// [`DbError::Sqlx`] on any database failure.
pub async fn remove_line_item(
    pool: &PgPool,
    line_item_id: i64,
    policy: &DeliveryPolicy,
) -> Result<OrderTotals, DbError> {
    let mut tx = pool.begin().await?;

    let order_id = sqlx::query_scalar::<_, i64>("SELECT order_id FROM order_line_items WHERE id = $1")
        .bind(line_item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;
    lock_order(&mut tx, order_id).await?;

    sqlx::query("DELETE FROM order_line_items WHERE id = $1")
        .bind(line_item_id)
        .execute(&mut *tx)
        .await?;

    let totals = recompute_order_totals(&mut tx, order_id, policy).await?;
    tx.commit().await?;

    Ok(totals)
}

/// Deletes an order and, by cascade, its line items. Returns whether a row
/// was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_order(pool: &PgPool, order_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(order_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Turns a bag into a persisted order with one line item per
/// (product, size).
///
/// If any line fails (typically a product deleted since it was bagged) the
/// partially written order is deleted and the error is returned.
///
/// # Errors
///
/// - [`DbError::ProductMissing`] if a bagged product no longer exists.
/// - [`DbError::Sqlx`] on any database failure.
pub async fn materialize_order(
    pool: &PgPool,
    order: &NewOrder<'_>,
    bag: &Bag,
    policy: &DeliveryPolicy,
) -> Result<OrderRow, DbError> {
    let created = create_order_row(pool, order).await?;

    for line in bag.lines() {
        if let Err(err) = add_line_item(pool, created.id, &line, policy).await {
            let cleanup = delete_order(pool, created.id).await;
            return Err(after_cleanup(created.id, cleanup, err));
        }
    }

    get_order(pool, created.id).await?.ok_or(DbError::NotFound)
}

/// The error that aborted materialization always wins; a failed delete of
/// the partial order is only logged.
fn after_cleanup(order_id: i64, cleanup: Result<bool, DbError>, err: DbError) -> DbError {
    if let Err(cleanup_err) = cleanup {
        tracing::error!(
            order_id,
            error = %cleanup_err,
            "failed to delete partial order"
        );
    }
    err
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order(pool: &PgPool, order_id: i64) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_by_number(
    pool: &PgPool,
    order_number: &OrderNumber,
) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
    ))
    .bind(order_number.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Line items of an order, in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_line_items(pool: &PgPool, order_id: i64) -> Result<Vec<LineItemRow>, DbError> {
    let rows = sqlx::query_as::<_, LineItemRow>(
        "SELECT li.id, li.order_id, li.product_id, p.name AS product_name, \
                p.sku AS product_sku, li.product_size, li.quantity, li.lineitem_total \
         FROM order_line_items li \
         JOIN products p ON p.id = li.product_id \
         WHERE li.order_id = $1 \
         ORDER BY li.id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// A profile's orders, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders_for_profile(
    pool: &PgPool,
    profile_id: i64,
) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_profile_id = $1 \
         ORDER BY date DESC, id DESC"
    ))
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Case-insensitive equality that also treats `NULL` = `NULL` as a match.
fn null_aware_ieq(column: &str, param: usize) -> String {
    format!("(({column} IS NULL AND ${param}::text IS NULL) OR LOWER({column}) = LOWER(${param}))")
}

fn match_sql() -> String {
    let text_columns = [
        "full_name",
        "email",
        "phone_number",
        "country",
        "postcode",
        "town_or_city",
        "street_address1",
        "street_address2",
        "county",
    ];
    let text_clauses: Vec<String> = text_columns
        .iter()
        .enumerate()
        .map(|(i, column)| null_aware_ieq(column, i + 1))
        .collect();

    format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE {} \
           AND grand_total = $10 AND original_bag = $11 AND stripe_pid = $12 \
         ORDER BY id LIMIT 1",
        text_clauses.join(" AND ")
    )
}

/// Looks for an order matching every field of `criteria`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_matching_order(
    pool: &PgPool,
    criteria: &OrderMatch,
) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&match_sql())
        .bind(&criteria.full_name)
        .bind(&criteria.email)
        .bind(&criteria.phone_number)
        .bind(&criteria.country)
        .bind(&criteria.postcode)
        .bind(&criteria.town_or_city)
        .bind(&criteria.street_address1)
        .bind(&criteria.street_address2)
        .bind(&criteria.county)
        .bind(criteria.grand_total)
        .bind(&criteria.original_bag)
        .bind(&criteria.stripe_pid)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}
