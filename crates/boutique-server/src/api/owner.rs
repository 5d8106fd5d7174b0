//! Store-owner catalog maintenance: products and categories.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use boutique_db::{CategoryRow, DbError, NewProduct, ProductPatch, ProductRow};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

const NAME_MAX: usize = 254;

#[derive(Debug, Deserialize)]
pub(super) struct CreateCategoryRequest {
    pub name: String,
    pub friendly_name: Option<String>,
}

fn validate_name(req_id: &str, field: &str, value: &str) -> Result<(), ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > NAME_MAX {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("{field} must be 1-{NAME_MAX} characters"),
        ));
    }
    Ok(())
}

fn validate_price(req_id: &str, price: Decimal) -> Result<(), ApiError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            format!("price must not be negative, got {price}"),
        ));
    }
    Ok(())
}

fn map_write_error(req_id: &str, e: &DbError, what: &str) -> ApiError {
    match e {
        DbError::Sqlx(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            ApiError::new(req_id, "conflict", format!("a {what} with that key already exists"))
        }
        // The only lookup a write performs is the named category.
        DbError::NotFound => ApiError::new(req_id, "validation_error", "unknown category"),
        _ => map_db_error(req_id.to_owned(), e),
    }
}

/// POST /api/v1/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<ApiResponse<ProductRow>>), ApiError> {
    let rid = &req_id.0;
    validate_name(rid, "name", &body.name)?;
    validate_price(rid, body.price)?;

    let row = boutique_db::create_product(&state.pool, &body)
        .await
        .map_err(|e| map_write_error(rid, &e, "product"))?;
    tracing::info!(product_id = row.id, name = %row.name, "owner: product created");

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// PATCH /api/v1/products/{id}
///
/// Sparse update.
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<ProductPatch>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let rid = &req_id.0;
    if let Some(ref name) = body.name {
        validate_name(rid, "name", name)?;
    }
    if let Some(price) = body.price {
        validate_price(rid, price)?;
    }

    boutique_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("product {id} not found")))?;

    let row = boutique_db::update_product(&state.pool, id, &body)
        .await
        .map_err(|e| map_write_error(rid, &e, "product"))?;

    Ok(Json(ApiResponse::new(row, req_id.0)))
}

/// DELETE /api/v1/products/{id}
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    boutique_db::delete_product(&state.pool, id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => {
                ApiError::new(req_id.0.clone(), "not_found", format!("product {id} not found"))
            }
            other => map_db_error(req_id.0.clone(), &other),
        })?;
    tracing::info!(product_id = id, "owner: product deleted");

    Ok(Json(ApiResponse::new(
        serde_json::json!({ "deleted": true }),
        req_id.0,
    )))
}

/// POST /api/v1/categories
///
/// Create or rename a category.
pub(super) async fn create_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryRow>>), ApiError> {
    let rid = &req_id.0;
    validate_name(rid, "name", &body.name)?;

    let row = boutique_db::create_category(
        &state.pool,
        body.name.trim(),
        body.friendly_name.as_deref(),
    )
    .await
    .map_err(|e| map_write_error(rid, &e, "category"))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(row, req_id.0))))
}

/// DELETE /api/v1/categories/{name}
///
/// Products in the category keep existing without one.
pub(super) async fn delete_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    boutique_db::delete_category(&state.pool, &name)
        .await
        .map_err(|e| match e {
            DbError::NotFound => {
                ApiError::new(req_id.0.clone(), "not_found", format!("category {name} not found"))
            }
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    Ok(Json(ApiResponse::new(
        serde_json::json!({ "deleted": true }),
        req_id.0,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_price_is_rejected() {
        assert!(validate_price("r", Decimal::new(-1, 2)).is_err());
        assert!(validate_price("r", Decimal::ZERO).is_ok());
        assert!(validate_price("r", Decimal::new(1999, 2)).is_ok());
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(validate_name("r", "name", "   ").is_err());
        assert!(validate_name("r", "name", &"x".repeat(NAME_MAX + 1)).is_err());
        assert!(validate_name("r", "name", "Linen Shirt").is_ok());
    }
}
