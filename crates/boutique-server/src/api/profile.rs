use axum::{
    extract::{Path, State},
    Extension, Json,
};
use boutique_core::{ProfileDefaults, ProfileForm};
use boutique_db::{OrderRow, ProfileRow};
use serde::Serialize;

use crate::middleware::{Customer, RequestId};

use super::checkout::{load_order_detail, OrderDetail};
use super::{map_core_error, map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ProfileView {
    username: String,
    defaults: ProfileDefaults,
    orders: Vec<OrderRow>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProfileUpdated {
    message: &'static str,
    defaults: ProfileDefaults,
}

/// The signed-in customer's profile, created on first visit.
async fn current_profile(
    state: &AppState,
    req_id: &str,
    customer: &Customer,
) -> Result<ProfileRow, ApiError> {
    // require_customer guarantees a username on these routes.
    let username = customer
        .username()
        .ok_or_else(|| ApiError::new(req_id, "unauthorized", "sign in to view your profile"))?;

    boutique_db::get_or_create_profile(&state.pool, username)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))
}

/// GET /api/v1/profile
///
/// Delivery defaults and order history.
pub(super) async fn view_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(customer): Extension<Customer>,
) -> Result<Json<ApiResponse<ProfileView>>, ApiError> {
    let profile = current_profile(&state, &req_id.0, &customer).await?;
    let orders = boutique_db::list_orders_for_profile(&state.pool, profile.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        ProfileView {
            defaults: profile.defaults(),
            username: profile.username,
            orders,
        },
        req_id.0,
    )))
}

/// PUT /api/v1/profile
///
/// Replace delivery defaults.
pub(super) async fn update_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(customer): Extension<Customer>,
    Json(form): Json<ProfileForm>,
) -> Result<Json<ApiResponse<ProfileUpdated>>, ApiError> {
    let defaults = form
        .validate()
        .map_err(|e| map_core_error(req_id.0.clone(), &e))?;
    let profile = current_profile(&state, &req_id.0, &customer).await?;

    let updated = boutique_db::update_profile_defaults(&state.pool, profile.id, &defaults)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        ProfileUpdated {
            message: "Profile updated successfully",
            defaults: updated.defaults(),
        },
        req_id.0,
    )))
}

/// GET /api/v1/profile/orders/{order_number}
///
/// A past order. Orders that
/// belong to someone else are reported as missing.
pub(super) async fn order_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(customer): Extension<Customer>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let profile = current_profile(&state, &req_id.0, &customer).await?;
    let (order, line_items) = load_order_detail(&state, &req_id.0, &order_number).await?;

    if order.user_profile_id != Some(profile.id) {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("order {order_number} not found"),
        ));
    }

    let message = format!(
        "This is a past confirmation for order number {}. \
         A confirmation email was sent on the order date.",
        order.order_number
    );

    Ok(Json(ApiResponse::new(
        OrderDetail {
            message,
            order,
            line_items,
        },
        req_id.0,
    )))
}
