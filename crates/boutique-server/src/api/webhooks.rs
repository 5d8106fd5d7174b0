use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use boutique_stripe::construct_event;

use crate::webhook::{handle_event, PgOrderStore, ReconcileSettings};

use super::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /api/v1/webhooks/stripe
///
/// Answers in plain text: the processor only looks at the status. A non-2xx
/// answer to a verified event makes it redeliver.
pub(super) async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("webhook: missing signature header");
        return (StatusCode::BAD_REQUEST, "missing signature").into_response();
    };

    let event = match construct_event(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        state.config.webhook_tolerance_secs,
    ) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "webhook: rejected");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let store = PgOrderStore {
        pool: &state.pool,
        policy: state.policy(),
    };
    let ack = handle_event(
        &store,
        &event,
        ReconcileSettings::from_app_config(&state.config),
    )
    .await;

    let status = if ack.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, ack.body).into_response()
}
