use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rand::Rng;

use stockline_orders::{DeleteOutcome, NewOrder, OrderStatus};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order))
        .route(
            "/:id",
            get(get_order).put(update_order_status).delete(delete_order),
        )
}

const CREATE_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 10;
const BACKOFF_JITTER_MS: u64 = 10;

/// Reserve stock and create an order, retrying transient storage failures.
///
/// Only `Transient` errors are retried; a failed attempt left no partial
/// writes, so repeating it is safe. Business refusals (insufficient stock,
/// unknown product) return immediately.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewOrder>,
) -> axum::response::Response {
    for attempt in 1..=CREATE_ATTEMPTS {
        match services
            .engine
            .reserve_stock_and_create_order(body.clone())
            .await
        {
            Ok(order) => {
                return (
                    StatusCode::CREATED,
                    [(header::LOCATION, format!("/orders/{}", order.id))],
                    Json(order),
                )
                    .into_response()
            }
            Err(err) if err.is_retriable() && attempt < CREATE_ATTEMPTS => {
                let backoff = BACKOFF_BASE_MS << (attempt - 1);
                let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
                tracing::warn!(
                    attempt,
                    backoff_ms = backoff + jitter,
                    error = %err,
                    "transient failure creating order; retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
            }
            Err(err) if err.is_retriable() => {
                return errors::json_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    "temporarily unavailable, please retry",
                )
            }
            Err(err) => return errors::engine_error_to_response(err),
        }
    }
    unreachable!("retry loop always returns")
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    let order = match services.engine.get_order(id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found")
        }
        Err(e) => return errors::engine_error_to_response(e),
    };
    let product = match services.engine.get_product(order.product_id).await {
        Ok(product) => product,
        Err(e) => return errors::engine_error_to_response(e),
    };
    (StatusCode::OK, Json(dto::order_detail(order, product))).into_response()
}

pub async fn update_order_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    Json(body): Json<dto::UpdateOrderRequest>,
) -> axum::response::Response {
    let Some(next) = OrderStatus::parse(&body.status) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: PENDING, PAID, SHIPPED, CANCELED",
        );
    };
    match services.engine.transition_order(id, next).await {
        Ok(Some(order)) => (StatusCode::OK, Json(order)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match services.engine.delete_or_downgrade_order(id).await {
        Ok(Some(DeleteOutcome::Deleted | DeleteOutcome::Downgraded)) => {
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(Some(DeleteOutcome::Rejected)) => errors::json_error(
            StatusCode::BAD_REQUEST,
            "not_deletable",
            "order cannot be deleted in its current status",
        ),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        Err(e) => errors::engine_error_to_response(e),
    }
}
