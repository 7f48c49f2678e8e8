//! Consistent JSON error responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockline_core::EngineError;

/// Map engine failures onto the HTTP boundary.
///
/// `Transient` only reaches this function after the caller has exhausted its
/// retries; at that point it surfaces as 503.
pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        EngineError::InsufficientStock => json_error(
            StatusCode::CONFLICT,
            "insufficient_stock",
            "insufficient stock",
        ),
        EngineError::InvalidTransition { from, to } => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_transition",
            format!("invalid transition from {from} to {to}"),
        ),
        EngineError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        EngineError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        EngineError::Transient(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
        EngineError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
