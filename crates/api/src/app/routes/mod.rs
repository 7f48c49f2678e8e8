use axum::{routing::post, Router};

pub mod orders;
pub mod products;
pub mod system;
pub mod webhooks;

pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/orders", orders::router())
        .nest("/webhooks", webhooks::router())
        .route("/test/reset-db", post(system::reset_db))
}
