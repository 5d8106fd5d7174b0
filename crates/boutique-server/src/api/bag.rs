//! Bag handlers. The bag is loaded from the session row, mutated in memory,
//! and written back with a single upsert.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use boutique_core::bag::{normalize_size, validate_quantity};
use boutique_core::{price_bag, Bag, BagKey, BagSummary};
use serde::{Deserialize, Serialize};

use crate::middleware::{RequestId, SessionId};

use super::{map_core_error, map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct BagItemRequest {
    pub quantity: i64,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RemoveQuery {
    pub size: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct BagUpdate {
    message: String,
    bag: BagSummary,
}

/// Prices `bag` at current product prices.
pub(super) async fn price_session_bag(
    state: &AppState,
    req_id: &str,
    bag: &Bag,
) -> Result<BagSummary, ApiError> {
    let ids: Vec<i64> = bag.product_ids().collect();
    let prices = boutique_db::get_product_prices(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;

    price_bag(bag, &prices, &state.policy()).map_err(|e| map_core_error(req_id.to_owned(), &e))
}

/// Blank sizes mean "no size".
fn parse_size(req_id: &str, raw: Option<&str>) -> Result<Option<String>, ApiError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_size)
        .transpose()
        .map_err(|e| map_core_error(req_id.to_owned(), &e))
}

fn describe(name: &str, size: Option<&str>) -> String {
    match size {
        Some(size) => format!("size {size} {name}"),
        None => name.to_owned(),
    }
}

async fn product_name(state: &AppState, req_id: &str, product_id: i64) -> Result<String, ApiError> {
    let product = boutique_db::get_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    Ok(product.map_or_else(|| format!("product {product_id}"), |p| p.name))
}

async fn store_and_price(
    state: &AppState,
    req_id: &str,
    session: &SessionId,
    bag: &Bag,
) -> Result<BagSummary, ApiError> {
    boutique_db::save_bag(&state.pool, &session.0, bag)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    price_session_bag(state, req_id, bag).await
}

/// GET /api/v1/bag
///
/// The priced bag for this session.
pub(super) async fn view_bag(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<ApiResponse<BagSummary>>, ApiError> {
    let bag = boutique_db::load_session(&state.pool, &session.0)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .bag;
    let summary = price_session_bag(&state, &req_id.0, &bag).await?;

    Ok(Json(ApiResponse::new(summary, req_id.0)))
}

/// POST /api/v1/bag/{product_id}
///
/// Add a quantity of a product.
pub(super) async fn add_to_bag(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<SessionId>,
    Path(product_id): Path<i64>,
    Json(body): Json<BagItemRequest>,
) -> Result<Json<ApiResponse<BagUpdate>>, ApiError> {
    let rid = &req_id.0;
    let quantity = validate_quantity(body.quantity, 1).map_err(|e| map_core_error(rid.clone(), &e))?;
    let size = parse_size(rid, body.size.as_deref())?;

    let product = boutique_db::get_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("product {product_id} not found")))?;

    let mut bag = boutique_db::load_session(&state.pool, &session.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .bag;
    let key = BagKey {
        product_id,
        size: size.clone(),
    };
    let existed = bag.quantity(&key).is_some();
    bag.add(product_id, size.as_deref(), quantity)
        .map_err(|e| map_core_error(rid.clone(), &e))?;
    let now = bag.quantity(&key).unwrap_or(quantity);

    let label = describe(&product.name, size.as_deref());
    let message = if existed {
        format!("Updated {label} quantity to {now}")
    } else {
        format!("Added {label} to your bag")
    };
    tracing::debug!(session = %session.0, product_id, quantity = now, "bag: add");

    let summary = store_and_price(&state, rid, &session, &bag).await?;
    Ok(Json(ApiResponse::new(
        BagUpdate {
            message,
            bag: summary,
        },
        req_id.0,
    )))
}

/// PUT /api/v1/bag/{product_id}
///
/// Set a line's quantity; 0 removes it.
pub(super) async fn adjust_bag(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<SessionId>,
    Path(product_id): Path<i64>,
    Json(body): Json<BagItemRequest>,
) -> Result<Json<ApiResponse<BagUpdate>>, ApiError> {
    let rid = &req_id.0;
    let quantity = validate_quantity(body.quantity, 0).map_err(|e| map_core_error(rid.clone(), &e))?;
    let size = parse_size(rid, body.size.as_deref())?;

    let mut bag = boutique_db::load_session(&state.pool, &session.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .bag;
    bag.set(product_id, size.as_deref(), quantity)
        .map_err(|e| map_core_error(rid.clone(), &e))?;

    let label = describe(&product_name(&state, rid, product_id).await?, size.as_deref());
    let message = if quantity > 0 {
        format!("Updated {label} quantity to {quantity}")
    } else {
        format!("Removed {label} from your bag")
    };

    let summary = store_and_price(&state, rid, &session, &bag).await?;
    Ok(Json(ApiResponse::new(
        BagUpdate {
            message,
            bag: summary,
        },
        req_id.0,
    )))
}

/// DELETE /api/v1/bag/{product_id}?size=
///
/// Remove a line.
pub(super) async fn remove_from_bag(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<SessionId>,
    Path(product_id): Path<i64>,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<ApiResponse<BagUpdate>>, ApiError> {
    let rid = &req_id.0;
    let size = parse_size(rid, query.size.as_deref())?;

    let mut bag = boutique_db::load_session(&state.pool, &session.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .bag;
    bag.remove(product_id, size.as_deref())
        .map_err(|e| map_core_error(rid.clone(), &e))?;

    let label = describe(&product_name(&state, rid, product_id).await?, size.as_deref());
    let summary = store_and_price(&state, rid, &session, &bag).await?;
    Ok(Json(ApiResponse::new(
        BagUpdate {
            message: format!("Removed {label} from your bag"),
            bag: summary,
        },
        req_id.0,
    )))
}
