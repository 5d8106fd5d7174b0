use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use boutique_core::{CatalogQuery, RawCatalogParams};
use boutique_db::{CategoryRow, ProductRow};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_core_error, map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ProductListing {
    products: Vec<ProductRow>,
    search_term: Option<String>,
    current_categories: Vec<CategoryRow>,
    /// `"{sort}_{direction}"`, with `None` standing in for a missing part.
    current_sorting: String,
}

/// GET /api/v1/products
///
/// Search, filter and sort the catalog.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<RawCatalogParams>,
) -> Result<Json<ApiResponse<ProductListing>>, ApiError> {
    let query =
        CatalogQuery::from_params(&params).map_err(|e| map_core_error(req_id.0.clone(), &e))?;

    let products = boutique_db::list_products(&state.pool, &query)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let current_categories = if query.categories.is_empty() {
        Vec::new()
    } else {
        boutique_db::list_categories(&state.pool)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?
            .into_iter()
            .filter(|c| query.categories.contains(&c.name))
            .collect()
    };

    Ok(Json(ApiResponse::new(
        ProductListing {
            products,
            search_term: query.search.clone(),
            current_categories,
            current_sorting: query.current_sorting(),
        },
        req_id.0,
    )))
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let product = boutique_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", format!("product {id} not found")))?;

    Ok(Json(ApiResponse::new(product, req_id.0)))
}

pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CategoryRow>>>, ApiError> {
    let rows = boutique_db::list_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(rows, req_id.0)))
}
