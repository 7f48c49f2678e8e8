//! In-memory engine for dev and tests.
//!
//! Everything sits behind one mutex, so check-and-decrement is atomic the
//! same way the Postgres row lock makes it atomic. Single-process only; the
//! production deployment uses [`super::PostgresEngine`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use stockline_core::{EngineError, EngineResult};
use stockline_orders::{DeleteOutcome, NewOrder, Order, OrderStatus};
use stockline_products::{NewProduct, Product, ProductPatch};

use super::{Engine, ProductPage};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
    events: HashSet<String>,
    next_product_id: i64,
    next_order_id: i64,
}

impl State {
    fn sku_taken(&self, sku: &str, exclude_id: Option<i64>) -> bool {
        self.products
            .values()
            .any(|p| p.sku == sku && Some(p.id) != exclude_id)
    }

    fn restore_stock(&mut self, product_id: i64, quantity: i32) {
        // The product may have been deleted since the order was placed;
        // then there is nothing to restore to.
        if let Some(product) = self.products.get_mut(&product_id) {
            product.stock += quantity;
        }
    }
}

/// Coarse-locked in-memory backend.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: Mutex<State>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Lock poisoning only happens after a panic in another test thread;
        // recover the data rather than cascading the panic.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Engine for InMemoryEngine {
    async fn create_product(&self, input: NewProduct) -> EngineResult<Product> {
        input.validate()?;
        let mut state = self.lock();
        if state.sku_taken(&input.sku, None) {
            return Err(EngineError::conflict("sku already exists"));
        }
        state.next_product_id += 1;
        let product = Product {
            id: state.next_product_id,
            sku: input.sku,
            name: input.name,
            price: input.price,
            stock: input.stock,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: i64) -> EngineResult<Option<Product>> {
        Ok(self.lock().products.get(&id).cloned())
    }

    async fn list_products(&self, page: u32, size: u32) -> EngineResult<ProductPage> {
        let state = self.lock();
        let skip = (page as usize - 1) * size as usize;
        let items = state
            .products
            .values()
            .skip(skip)
            .take(size as usize)
            .cloned()
            .collect();
        Ok(ProductPage {
            items,
            page,
            size,
            total: state.products.len() as i64,
        })
    }

    async fn update_product(&self, id: i64, input: NewProduct) -> EngineResult<Option<Product>> {
        input.validate()?;
        let mut state = self.lock();
        if !state.products.contains_key(&id) {
            return Ok(None);
        }
        if state.sku_taken(&input.sku, Some(id)) {
            return Err(EngineError::conflict("sku already exists"));
        }
        let product = Product {
            id,
            sku: input.sku,
            name: input.name,
            price: input.price,
            stock: input.stock,
        };
        state.products.insert(id, product.clone());
        Ok(Some(product))
    }

    async fn patch_product(&self, id: i64, patch: ProductPatch) -> EngineResult<Option<Product>> {
        patch.validate()?;
        let mut state = self.lock();
        if let Some(sku) = &patch.sku {
            if state.sku_taken(sku, Some(id)) {
                return Err(EngineError::conflict("sku already exists"));
            }
        }
        match state.products.get_mut(&id) {
            Some(product) => {
                patch.apply_to(product);
                Ok(Some(product.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_product(&self, id: i64) -> EngineResult<bool> {
        Ok(self.lock().products.remove(&id).is_some())
    }

    async fn reserve_stock_and_create_order(&self, input: NewOrder) -> EngineResult<Order> {
        input.validate()?;
        let mut state = self.lock();
        let Some(product) = state.products.get_mut(&input.product_id) else {
            return Err(EngineError::NotFound);
        };
        if product.stock < input.quantity {
            return Err(EngineError::InsufficientStock);
        }
        product.stock -= input.quantity;
        state.next_order_id += 1;
        let order = Order {
            id: state.next_order_id,
            product_id: input.product_id,
            quantity: input.quantity,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: i64) -> EngineResult<Option<Order>> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn transition_order(&self, id: i64, next: OrderStatus) -> EngineResult<Option<Order>> {
        let mut state = self.lock();
        let Some(current) = state.orders.get(&id).cloned() else {
            return Ok(None);
        };
        if current.status == next {
            return Ok(Some(current));
        }
        current.status.check_transition(next)?;
        if next == OrderStatus::Canceled {
            state.restore_stock(current.product_id, current.quantity);
        }
        match state.orders.get_mut(&id) {
            Some(order) => {
                order.status = next;
                Ok(Some(order.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_or_downgrade_order(&self, id: i64) -> EngineResult<Option<DeleteOutcome>> {
        let status = {
            let state = self.lock();
            match state.orders.get(&id) {
                Some(order) => order.status,
                None => return Ok(None),
            }
        };
        match status {
            OrderStatus::Pending => {
                let mut state = self.lock();
                let Some(order) = state.orders.remove(&id) else {
                    return Ok(None);
                };
                state.restore_stock(order.product_id, order.quantity);
                Ok(Some(DeleteOutcome::Deleted))
            }
            OrderStatus::Paid => match self.transition_order(id, OrderStatus::Canceled).await? {
                Some(_) => Ok(Some(DeleteOutcome::Downgraded)),
                None => Ok(None),
            },
            OrderStatus::Shipped | OrderStatus::Canceled => Ok(Some(DeleteOutcome::Rejected)),
        }
    }

    async fn try_record_event(&self, event_id: &str) -> EngineResult<bool> {
        Ok(self.lock().events.insert(event_id.to_string()))
    }

    async fn forget_event(&self, event_id: &str) -> EngineResult<()> {
        self.lock().events.remove(event_id);
        Ok(())
    }

    async fn reset(&self) -> EngineResult<()> {
        let mut state = self.lock();
        *state = State::default();
        Ok(())
    }
}
