use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use stockline_products::{NewProduct, ProductPatch};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewProduct>,
) -> axum::response::Response {
    match services.engine.create_product(body).await {
        Ok(product) => (
            StatusCode::CREATED,
            [(header::LOCATION, format!("/products/{}", product.id))],
            Json(product),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match services.engine.get_product(id).await {
        Ok(Some(product)) => (StatusCode::OK, Json(product)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListParams>,
) -> axum::response::Response {
    if let Err(msg) = params.validate() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg);
    }
    match services.engine.list_products(params.page, params.size).await {
        Ok(page) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "items": page.items,
                "page": page.page,
                "size": page.size,
                "total": page.total,
            })),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    /// `?partial=true` switches PUT to patch semantics: only fields present
    /// in the body change.
    #[serde(default)]
    pub partial: bool,
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    Query(query): Query<UpdateQuery>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let result = if query.partial {
        let patch: ProductPatch = match serde_json::from_value(body) {
            Ok(p) => p,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string())
            }
        };
        services.engine.patch_product(id, patch).await
    } else {
        let input: NewProduct = match serde_json::from_value(body) {
            Ok(p) => p,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string())
            }
        };
        services.engine.update_product(id, input).await
    };

    match result {
        Ok(Some(product)) => (StatusCode::OK, Json(product)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match services.engine.delete_product(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::engine_error_to_response(e),
    }
}
