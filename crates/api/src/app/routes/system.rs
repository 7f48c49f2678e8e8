use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Wipe all state. Test-environment endpoint only.
pub async fn reset_db(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine.reset().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"detail": "database reset"})),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
