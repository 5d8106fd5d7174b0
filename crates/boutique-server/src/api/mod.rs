mod bag;
mod catalog;
mod checkout;
mod owner;
mod profile;
mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use boutique_core::{AppConfig, CoreError, DeliveryPolicy};
use boutique_db::DbError;
use boutique_stripe::StripeClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    customer_identity, enforce_rate_limit, request_id, require_bearer_auth, require_customer,
    session_id, AuthState, RateLimitState, RequestId, IDENTITY_HEADER, SESSION_HEADER,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub stripe: Arc<StripeClient>,
}

impl AppState {
    pub(crate) fn policy(&self) -> DeliveryPolicy {
        self.config.delivery_policy()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" | "bag_outdated" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "payment_provider_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) const BAG_OUTDATED_MESSAGE: &str =
    "One of the products in your bag wasn't found in our database. Please call us for assistance!";

pub(super) fn map_core_error(request_id: String, error: &CoreError) -> ApiError {
    match error {
        CoreError::ProductNotFound(_) => {
            ApiError::new(request_id, "bag_outdated", BAG_OUTDATED_MESSAGE)
        }
        CoreError::NotInBag { .. } => ApiError::new(request_id, "not_found", error.to_string()),
        CoreError::BagShapeMismatch { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        CoreError::InvalidQuantity { .. }
        | CoreError::InvalidSize(_)
        | CoreError::MalformedBag(_)
        | CoreError::EmptySearch
        | CoreError::InvalidSortKey(_)
        | CoreError::Validation { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
    }
}

pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "record not found"),
        DbError::ProductMissing(product_id) => {
            tracing::warn!(product_id, "bagged product no longer exists");
            ApiError::new(request_id, "bag_outdated", BAG_OUTDATED_MESSAGE)
        }
        DbError::Core(e) => map_core_error(request_id, e),
        DbError::Json(_) | DbError::Sqlx(_) | DbError::Migration(_) => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(SESSION_HEADER),
            HeaderName::from_static(IDENTITY_HEADER),
            HeaderName::from_static("stripe-signature"),
        ])
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(SESSION_HEADER),
        ])
}

fn storefront_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/products", get(catalog::list_products))
        .route("/api/v1/products/{id}", get(catalog::get_product))
        .route("/api/v1/categories", get(catalog::list_categories))
        .route("/api/v1/bag", get(bag::view_bag))
        .route(
            "/api/v1/bag/{product_id}",
            post(bag::add_to_bag)
                .put(bag::adjust_bag)
                .delete(bag::remove_from_bag),
        )
        .route(
            "/api/v1/checkout",
            get(checkout::start_checkout).post(checkout::submit_checkout),
        )
        .route("/api/v1/checkout/cache", post(checkout::cache_checkout_data))
        .route(
            "/api/v1/checkout/success/{order_number}",
            get(checkout::checkout_success),
        )
        .route("/api/v1/webhooks/stripe", post(webhooks::stripe_webhook))
}

fn customer_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/profile",
            get(profile::view_profile).put(profile::update_profile),
        )
        .route(
            "/api/v1/profile/orders/{order_number}",
            get(profile::order_history),
        )
        .layer(axum::middleware::from_fn(require_customer))
}

fn owner_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/products", post(owner::create_product))
        .route(
            "/api/v1/products/{id}",
            patch(owner::update_product).delete(owner::delete_product),
        )
        .route("/api/v1/categories", post(owner::create_category))
        .route("/api/v1/categories/{name}", delete(owner::delete_category))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(storefront_router())
        .merge(customer_router())
        .merge(owner_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn(session_id))
                .layer(axum::middleware::from_fn(customer_identity)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match boutique_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
