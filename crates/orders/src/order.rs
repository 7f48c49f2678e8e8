use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{EngineError, EngineResult};

use crate::status::OrderStatus;

/// A claim of quantity against a product's stock.
///
/// `quantity` is fixed at creation and never changes; `created_at` is set
/// once. The product reference is non-owning: the product may be deleted
/// while the order still exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for order creation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewOrder {
    pub product_id: i64,
    pub quantity: i32,
}

impl NewOrder {
    pub fn validate(&self) -> EngineResult<()> {
        if self.quantity <= 0 {
            return Err(EngineError::validation("quantity must be positive"));
        }
        Ok(())
    }
}

/// Outcome of the delete/cancel surface.
///
/// PENDING orders have no external-world effect yet, so they are erased
/// outright. PAID orders keep an auditable payment record and are
/// soft-canceled instead. SHIPPED orders are physically irreversible and
/// are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Downgraded,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        for quantity in [0, -1, i32::MIN] {
            let input = NewOrder {
                product_id: 1,
                quantity,
            };
            assert!(matches!(
                input.validate(),
                Err(EngineError::Validation(_))
            ));
        }
        assert!(
            NewOrder {
                product_id: 1,
                quantity: 1
            }
            .validate()
            .is_ok()
        );
    }
}
