use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use stockline_infra::WebhookOutcome;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::signature::SignatureError;

pub fn router() -> Router {
    Router::new().route("/payment", post(payment))
}

/// Payment provider webhook.
///
/// The signature is verified over the raw bytes before any parsing, so a
/// request that fails authentication can have no effect of any kind. Event
/// types other than `payment.succeeded` are acknowledged and ignored.
pub async fn payment(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let header = headers.get("X-Signature").and_then(|v| v.to_str().ok());
    match services.verifier.verify(&body, header) {
        Ok(()) => {}
        Err(SignatureError::NotConfigured) => {
            tracing::error!("webhook received but WEBHOOK_SECRET is not set");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "not_configured",
                "webhook secret not configured",
            );
        }
        Err(SignatureError::Missing) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "missing_signature",
                "missing signature",
            )
        }
        Err(SignatureError::Invalid) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                "invalid signature",
            )
        }
    }

    let payload: dto::WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string())
        }
    };
    // Types other than payment.succeeded carry no obligations at all; they
    // are acknowledged before any field requirements apply.
    if payload.kind.as_deref() != Some("payment.succeeded") {
        return (StatusCode::OK, Json(serde_json::json!({"detail": "ignored"}))).into_response();
    }
    let Some(event_id) = payload.event_id.filter(|id| !id.is_empty()) else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", "event_id is required");
    };
    let Some(order_id) = payload.order_id else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", "order_id is required");
    };

    match services
        .engine
        .apply_payment_succeeded(&event_id, order_id)
        .await
    {
        Ok(WebhookOutcome::Applied) => {
            (StatusCode::OK, Json(serde_json::json!({"detail": "ok"}))).into_response()
        }
        Ok(WebhookOutcome::AlreadyProcessed) => (
            StatusCode::OK,
            Json(serde_json::json!({"detail": "event already processed"})),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
