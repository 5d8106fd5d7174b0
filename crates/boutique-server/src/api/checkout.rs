//! Checkout: payment intent creation, intent metadata caching, order
//! submission and the confirmation view.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use boutique_core::{to_minor_units, BagSummary, OrderForm, OrderNumber, ProfileDefaults};
use boutique_db::{LineItemRow, NewOrder, OrderRow};
use boutique_stripe::{pid_from_client_secret, IntentMetadata};
use serde::{Deserialize, Serialize};

use crate::middleware::{Customer, RequestId, SessionId};
use crate::webhook::ANONYMOUS_USER;

use super::bag::price_session_bag;
use super::{map_core_error, map_db_error, ApiError, ApiResponse, AppState};

const EMPTY_BAG_MESSAGE: &str = "There's nothing in your bag at the moment";
const PAYMENT_UNAVAILABLE_MESSAGE: &str =
    "Sorry, your payment cannot be processed right now. Please try again later.";

#[derive(Debug, Serialize)]
pub(super) struct CheckoutIntent {
    client_secret: String,
    stripe_public_key: String,
    bag: BagSummary,
    /// Saved delivery defaults for a signed-in customer.
    prefill: Option<ProfileDefaults>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CacheRequest {
    pub client_secret: String,
    #[serde(default)]
    pub save_info: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutRequest {
    #[serde(flatten)]
    pub form: OrderForm,
    pub client_secret: String,
    #[serde(default)]
    pub save_info: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct CheckoutCreated {
    order_number: String,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderDetail {
    pub message: String,
    pub order: OrderRow,
    pub line_items: Vec<LineItemRow>,
}

fn intent_id<'a>(req_id: &str, client_secret: &'a str) -> Result<&'a str, ApiError> {
    pid_from_client_secret(client_secret)
        .ok_or_else(|| ApiError::new(req_id, "bad_request", "malformed client_secret"))
}

/// Loads an order by number together with its line items.
pub(super) async fn load_order_detail(
    state: &AppState,
    req_id: &str,
    raw_number: &str,
) -> Result<(OrderRow, Vec<LineItemRow>), ApiError> {
    let not_found = || ApiError::new(req_id, "not_found", format!("order {raw_number} not found"));

    let number = OrderNumber::parse(raw_number).ok_or_else(not_found)?;
    let order = boutique_db::get_order_by_number(&state.pool, &number)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(not_found)?;
    let line_items = boutique_db::list_line_items(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;

    Ok((order, line_items))
}

/// GET /api/v1/checkout
///
/// Create a payment intent for the bag's grand total.
pub(super) async fn start_checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<SessionId>,
    Extension(customer): Extension<Customer>,
) -> Result<Json<ApiResponse<CheckoutIntent>>, ApiError> {
    let rid = &req_id.0;
    let bag = boutique_db::load_session(&state.pool, &session.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .bag;
    if bag.is_empty() {
        return Err(ApiError::new(rid, "bad_request", EMPTY_BAG_MESSAGE));
    }

    let summary = price_session_bag(&state, rid, &bag).await?;
    let amount = to_minor_units(summary.grand_total)
        .ok_or_else(|| ApiError::new(rid, "internal_error", "bag total out of range"))?;

    if state.config.stripe_public_key.is_empty() {
        tracing::warn!("STRIPE_PUBLIC_KEY is not set; the client cannot confirm payments");
    }

    let intent = state
        .stripe
        .create_payment_intent(amount, &state.config.stripe_currency)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to create payment intent");
            ApiError::new(rid, "payment_provider_error", PAYMENT_UNAVAILABLE_MESSAGE)
        })?;
    let client_secret = intent.client_secret.ok_or_else(|| {
        tracing::error!(pid = %intent.id, "payment intent has no client secret");
        ApiError::new(rid, "payment_provider_error", PAYMENT_UNAVAILABLE_MESSAGE)
    })?;

    let prefill = match customer.username() {
        Some(username) => Some(
            boutique_db::get_or_create_profile(&state.pool, username)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?
                .defaults(),
        ),
        None => None,
    };

    Ok(Json(ApiResponse::new(
        CheckoutIntent {
            client_secret,
            stripe_public_key: state.config.stripe_public_key.clone(),
            bag: summary,
            prefill,
        },
        req_id.0,
    )))
}

/// POST /api/v1/checkout/cache
///
/// Attach the bag snapshot, the save-info flag
/// and the username to the payment intent before the client confirms it.
pub(super) async fn cache_checkout_data(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<SessionId>,
    Extension(customer): Extension<Customer>,
    Json(body): Json<CacheRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let pid = intent_id(rid, &body.client_secret)?;

    let bag = boutique_db::load_session(&state.pool, &session.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .bag;
    let metadata = IntentMetadata {
        bag: bag.to_snapshot(),
        save_info: body.save_info,
        username: customer.username().unwrap_or(ANONYMOUS_USER).to_owned(),
    };

    state
        .stripe
        .modify_payment_intent_metadata(pid, &metadata)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, pid, "failed to cache checkout data");
            ApiError::new(rid, "bad_request", PAYMENT_UNAVAILABLE_MESSAGE)
        })?;

    boutique_db::set_save_info(&state.pool, &session.0, body.save_info)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        serde_json::json!({ "cached": true }),
        req_id.0,
    )))
}

/// POST /api/v1/checkout
///
/// Validate the form and turn the bag into an order.
pub(super) async fn submit_checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<SessionId>,
    Extension(customer): Extension<Customer>,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutCreated>>), ApiError> {
    let rid = &req_id.0;
    let details = body
        .form
        .validate()
        .map_err(|e| map_core_error(rid.clone(), &e))?;
    let pid = intent_id(rid, &body.client_secret)?;

    let bag = boutique_db::load_session(&state.pool, &session.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .bag;
    if bag.is_empty() {
        return Err(ApiError::new(rid, "bad_request", EMPTY_BAG_MESSAGE));
    }

    let profile = match customer.username() {
        Some(username) => Some(
            boutique_db::get_or_create_profile(&state.pool, username)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?,
        ),
        None => None,
    };

    let snapshot = bag.to_snapshot();
    let order = boutique_db::materialize_order(
        &state.pool,
        &NewOrder {
            details: &details,
            user_profile_id: profile.as_ref().map(|p| p.id),
            original_bag: &snapshot,
            stripe_pid: pid,
        },
        &bag,
        &state.policy(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    if let (Some(profile), true) = (&profile, body.save_info) {
        let defaults =
            ProfileDefaults::from_checkout(Some(details.phone_number.clone()), &details.address);
        boutique_db::update_profile_defaults(&state.pool, profile.id, &defaults)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
    }

    boutique_db::set_save_info(&state.pool, &session.0, body.save_info)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    boutique_db::clear_bag(&state.pool, &session.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        order_number = %order.order_number,
        pid,
        grand_total = %order.grand_total,
        "checkout: order created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            CheckoutCreated {
                order_number: order.order_number,
            },
            req_id.0,
        )),
    ))
}

/// GET /api/v1/checkout/success/{order_number}
pub(super) async fn checkout_success(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let (order, line_items) = load_order_detail(&state, &req_id.0, &order_number).await?;

    let message = format!(
        "Order successfully processed! Your order number is {}. \
         A confirmation email will be sent to {}.",
        order.order_number, order.email
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
