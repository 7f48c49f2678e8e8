//! Request/response DTOs and JSON mapping helpers.

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use stockline_orders::{Order, OrderStatus};
use stockline_products::Product;

/// Pagination query for product listings. 1-based; any positive size is
/// accepted.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    50
}

impl ListParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 || self.size < 1 {
            return Err("page and size must be >= 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: String,
}

/// Incoming webhook body. Fields are optional so validation failures map to
/// 400 rather than a deserialization error naming serde internals.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub event_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub order_id: Option<i64>,
}

/// Order plus a snapshot of its product, if the product still exists.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub product: Option<Product>,
}

pub fn order_detail(order: Order, product: Option<Product>) -> OrderDetail {
    OrderDetail {
        id: order.id,
        product_id: order.product_id,
        quantity: order.quantity,
        status: order.status,
        created_at: order.created_at,
        product,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_bounds() {
        assert!(ListParams { page: 1, size: 1 }.validate().is_ok());
        assert!(ListParams { page: 7, size: 500 }.validate().is_ok());

        assert!(ListParams { page: 0, size: 10 }.validate().is_err());
        assert!(ListParams { page: 1, size: 0 }.validate().is_err());
    }

    #[test]
    fn webhook_payload_tolerates_missing_fields() {
        let payload: WebhookPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.event_id.is_none());
        assert!(payload.kind.is_none());
        assert!(payload.order_id.is_none());

        let payload: WebhookPayload =
            serde_json::from_str(r#"{"event_id":"e","type":"payment.succeeded","order_id":7}"#)
                .unwrap();
        assert_eq!(payload.kind.as_deref(), Some("payment.succeeded"));
        assert_eq!(payload.order_id, Some(7));
    }
}
