//! Engine trait: transactional stock/order operations and the webhook
//! application protocol.

use async_trait::async_trait;

use stockline_core::{EngineError, EngineResult};
use stockline_orders::{DeleteOutcome, NewOrder, Order, OrderStatus};
use stockline_products::{NewProduct, Product, ProductPatch};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryEngine;
pub use postgres::PostgresEngine;

/// One page of a product listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub page: u32,
    pub size: u32,
    pub total: i64,
}

/// Result of applying a payment-succeeded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// First sighting: the order was moved to PAID.
    Applied,
    /// The event id was already in the ledger; nothing was mutated.
    AlreadyProcessed,
}

/// Transactional storage operations for products, orders and the webhook
/// dedup ledger.
///
/// Every method is atomic per attempt: a failure leaves no partial writes
/// behind, which is what makes `Transient` failures safe to retry.
#[async_trait]
pub trait Engine: Send + Sync {
    // --- products ---

    /// Insert a new product. Duplicate SKUs surface as `Conflict`.
    async fn create_product(&self, input: NewProduct) -> EngineResult<Product>;

    async fn get_product(&self, id: i64) -> EngineResult<Option<Product>>;

    /// Page through products ordered by id. `page` and `size` are 1-based
    /// and validated by the caller.
    async fn list_products(&self, page: u32, size: u32) -> EngineResult<ProductPage>;

    /// Full update: every field is replaced. Returns `None` if the product
    /// does not exist.
    async fn update_product(&self, id: i64, input: NewProduct) -> EngineResult<Option<Product>>;

    /// Partial update: only the provided fields change.
    async fn patch_product(&self, id: i64, patch: ProductPatch) -> EngineResult<Option<Product>>;

    /// Delete a product. Orders referencing it are left untouched; later
    /// cancellations of those orders find no product and restore nothing.
    async fn delete_product(&self, id: i64) -> EngineResult<bool>;

    // --- stock engine ---

    /// Reserve stock and create a PENDING order in one transaction.
    ///
    /// Takes an exclusive row lock on the product (blocking until it is
    /// granted), checks `stock >= quantity` under the lock, then decrements
    /// stock and inserts the order. Concurrent reservations against the same
    /// product serialize on the lock; no pair of them can jointly oversell.
    async fn reserve_stock_and_create_order(&self, input: NewOrder) -> EngineResult<Order>;

    async fn get_order(&self, id: i64) -> EngineResult<Option<Order>>;

    // --- order state machine ---

    /// Apply a status transition.
    ///
    /// Unknown order id is `Ok(None)` — missing, not rejected. A request for
    /// the current status is absorbed as a no-op success. Disallowed edges
    /// fail with `InvalidTransition`. Transitions into CANCELED restore the
    /// order's quantity to its product (under the product row lock) and set
    /// the status in the same transaction.
    async fn transition_order(&self, id: i64, next: OrderStatus) -> EngineResult<Option<Order>>;

    /// Delete or cancel an order depending on its status: PENDING orders are
    /// erased with their stock restored, PAID orders are downgraded to
    /// CANCELED, SHIPPED (and already-CANCELED) orders are refused.
    async fn delete_or_downgrade_order(&self, id: i64) -> EngineResult<Option<DeleteOutcome>>;

    // --- ledger ---

    /// Record an event id. `Ok(true)` on first sighting; `Ok(false)` when
    /// the unique constraint reports a replay. Any other storage failure
    /// propagates as an error, never as `false`.
    async fn try_record_event(&self, event_id: &str) -> EngineResult<bool>;

    /// Remove a ledger entry. Compensating action only; not part of the
    /// normal path.
    async fn forget_event(&self, event_id: &str) -> EngineResult<()>;

    // --- test support ---

    /// Wipe all rows (test endpoint).
    async fn reset(&self) -> EngineResult<()>;

    // --- webhook applier ---

    /// Apply a `payment.succeeded` event at most once.
    ///
    /// The order lookup happens before the ledger insert so that events
    /// referencing unknown orders never pollute the ledger. If the PAID
    /// transition fails after the ledger recorded the event (order deleted
    /// concurrently, or already moved elsewhere), the ledger entry is
    /// removed again so a later retry of the same event id counts as a
    /// first sighting.
    async fn apply_payment_succeeded(
        &self,
        event_id: &str,
        order_id: i64,
    ) -> EngineResult<WebhookOutcome> {
        if self.get_order(order_id).await?.is_none() {
            return Err(EngineError::NotFound);
        }

        if !self.try_record_event(event_id).await? {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let transition = self.transition_order(order_id, OrderStatus::Paid).await;
        let failure = match transition {
            Ok(Some(_)) => return Ok(WebhookOutcome::Applied),
            // Order vanished between lookup and transition; same compensation
            // as any other transition failure.
            Ok(None) => EngineError::NotFound,
            Err(err) => err,
        };

        if let Err(forget_err) = self.forget_event(event_id).await {
            tracing::error!(
                event_id,
                error = %forget_err,
                "failed to roll back ledger entry after transition failure"
            );
        }
        Err(failure)
    }
}
