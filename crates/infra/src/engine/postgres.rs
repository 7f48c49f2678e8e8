//! Postgres-backed engine.
//!
//! Concurrency discipline: every stock mutation happens inside a transaction
//! that first takes an exclusive row lock on the product (`SELECT … FOR
//! UPDATE`, blocking — no `NOWAIT`), so the availability check and the
//! decrement are a single critical section. The webhook ledger relies on its
//! unique constraint alone; no lock is taken before the insert attempt.
//!
//! ## Error mapping
//!
//! | Postgres code | Meaning              | `EngineError` |
//! |---------------|----------------------|---------------|
//! | 23505         | unique violation     | `Conflict`    |
//! | 40001         | serialization failure| `Transient`   |
//! | 40P01         | deadlock detected    | `Transient`   |
//! | 55P03         | lock not available   | `Transient`   |
//! | 57014         | statement timeout    | `Transient`   |
//! | other         |                      | `Storage`     |

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use stockline_core::{EngineError, EngineResult};
use stockline_orders::{DeleteOutcome, NewOrder, Order, OrderStatus};
use stockline_products::{NewProduct, Product, ProductPatch};

use super::{Engine, ProductPage};

/// Production engine; safe across any number of server processes because all
/// mutual exclusion lives in the database.
#[derive(Debug, Clone)]
pub struct PostgresEngine {
    pool: PgPool,
}

impl PostgresEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str) -> EngineResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> EngineResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EngineError::storage(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Engine for PostgresEngine {
    #[instrument(skip(self, input), fields(sku = %input.sku), err)]
    async fn create_product(&self, input: NewProduct) -> EngineResult<Product> {
        input.validate()?;
        let row: ProductRow = sqlx::query_as(
            r#"
            INSERT INTO products (sku, name, price, stock)
            VALUES ($1, $2, $3, $4)
            RETURNING id, sku, name, price, stock
            "#,
        )
        .bind(&input.sku)
        .bind(&input.name)
        .bind(input.price)
        .bind(input.stock)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                EngineError::conflict("sku already exists")
            } else {
                map_sqlx_error("create_product", e)
            }
        })?;
        Ok(row.into_product())
    }

    async fn get_product(&self, id: i64) -> EngineResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as("SELECT id, sku, name, price, stock FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_product", e))?;
        Ok(row.map(ProductRow::into_product))
    }

    async fn list_products(&self, page: u32, size: u32) -> EngineResult<ProductPage> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?;

        let offset = (i64::from(page) - 1) * i64::from(size);
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, sku, name, price, stock
            FROM products
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        Ok(ProductPage {
            items: rows.into_iter().map(ProductRow::into_product).collect(),
            page,
            size,
            total: total.0,
        })
    }

    async fn update_product(&self, id: i64, input: NewProduct) -> EngineResult<Option<Product>> {
        input.validate()?;
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            UPDATE products
            SET sku = $2, name = $3, price = $4, stock = $5
            WHERE id = $1
            RETURNING id, sku, name, price, stock
            "#,
        )
        .bind(id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(input.price)
        .bind(input.stock)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                EngineError::conflict("sku already exists")
            } else {
                map_sqlx_error("update_product", e)
            }
        })?;
        Ok(row.map(ProductRow::into_product))
    }

    async fn patch_product(&self, id: i64, patch: ProductPatch) -> EngineResult<Option<Product>> {
        patch.validate()?;
        if patch.is_empty() {
            return self.get_product(id).await;
        }
        // COALESCE keeps this a single parameterized statement for any
        // combination of provided fields.
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            UPDATE products
            SET sku = COALESCE($2, sku),
                name = COALESCE($3, name),
                price = COALESCE($4, price),
                stock = COALESCE($5, stock)
            WHERE id = $1
            RETURNING id, sku, name, price, stock
            "#,
        )
        .bind(id)
        .bind(patch.sku.as_deref())
        .bind(patch.name.as_deref())
        .bind(patch.price)
        .bind(patch.stock)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                EngineError::conflict("sku already exists")
            } else {
                map_sqlx_error("patch_product", e)
            }
        })?;
        Ok(row.map(ProductRow::into_product))
    }

    async fn delete_product(&self, id: i64) -> EngineResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(
        skip(self, input),
        fields(product_id = input.product_id, quantity = input.quantity),
        err
    )]
    async fn reserve_stock_and_create_order(&self, input: NewOrder) -> EngineResult<Order> {
        input.validate()?;
        let mut tx = self.begin().await?;

        // Exclusive row lock: concurrent reservations against this product
        // serialize here; the stock check below is made under the lock.
        let product: Option<ProductRow> = sqlx::query_as(
            "SELECT id, sku, name, price, stock FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(input.product_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;

        let Some(product) = product else {
            return Err(EngineError::NotFound);
        };
        if product.stock < input.quantity {
            return Err(EngineError::InsufficientStock);
        }

        sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2")
            .bind(input.quantity)
            .bind(input.product_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        let order: OrderRow = sqlx::query_as(
            r#"
            INSERT INTO orders (product_id, quantity, status)
            VALUES ($1, $2, $3)
            RETURNING id, product_id, quantity, status, created_at
            "#,
        )
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        order.into_order()
    }

    async fn get_order(&self, id: i64) -> EngineResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, product_id, quantity, status, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_order", e))?;
        row.map(OrderRow::into_order).transpose()
    }

    #[instrument(skip(self), fields(next = %next), err)]
    async fn transition_order(&self, id: i64, next: OrderStatus) -> EngineResult<Option<Order>> {
        let mut tx = self.begin().await?;

        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, product_id, quantity, status, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("get_order", e))?;

        let Some(order) = row.map(OrderRow::into_order).transpose()? else {
            return Ok(None);
        };
        if order.status == next {
            // Idempotent self-transition: absorbed, nothing written.
            return Ok(Some(order));
        }
        order.status.check_transition(next)?;

        if next == OrderStatus::Canceled {
            restore_stock(&mut tx, order.product_id, order.quantity).await?;
        }

        let updated: OrderRow = sqlx::query_as(
            r#"
            UPDATE orders SET status = $2 WHERE id = $1
            RETURNING id, product_id, quantity, status, created_at
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_status", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        updated.into_order().map(Some)
    }

    async fn delete_or_downgrade_order(&self, id: i64) -> EngineResult<Option<DeleteOutcome>> {
        let Some(order) = self.get_order(id).await? else {
            return Ok(None);
        };
        match order.status {
            OrderStatus::Pending => {
                let mut tx = self.begin().await?;
                restore_stock(&mut tx, order.product_id, order.quantity).await?;
                sqlx::query("DELETE FROM orders WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("delete_order", e))?;
                tx.commit()
                    .await
                    .map_err(|e| map_sqlx_error("commit", e))?;
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
        match sqlx::query("INSERT INTO processed_events (event_id) VALUES ($1)")
            .bind(event_id)
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(true),
            // Replay: the statement's implicit transaction rolled back, so
            // nothing was written. Any other failure propagates.
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(map_sqlx_error("record_event", e)),
        }
    }

    async fn forget_event(&self, event_id: &str) -> EngineResult<()> {
        sqlx::query("DELETE FROM processed_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("forget_event", e))?;
        Ok(())
    }

    async fn reset(&self) -> EngineResult<()> {
        sqlx::query("TRUNCATE processed_events, orders, products RESTART IDENTITY")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("reset", e))?;
        Ok(())
    }
}

impl PostgresEngine {
    async fn begin(&self) -> EngineResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))
    }
}

/// Add quantity back to a product's stock under its row lock, inside the
/// caller's transaction. If the product was deleted in the meantime there is
/// nothing to restore to. Not idempotent: callers invoke it exactly once per
/// canceled or deleted order.
async fn restore_stock(
    tx: &mut Transaction<'static, Postgres>,
    product_id: i64,
    quantity: i32,
) -> EngineResult<()> {
    let locked: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;
    if locked.is_some() {
        sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
            .bind(quantity)
            .bind(product_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("restore_stock", e))?;
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    sku: String,
    name: String,
    price: f64,
    stock: i32,
}

impl ProductRow {
    fn into_product(self) -> Product {
        Product {
            id: self.id,
            sku: self.sku,
            name: self.name,
            price: self.price,
            stock: self.stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    product_id: i64,
    quantity: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> EngineResult<Order> {
        let status = OrderStatus::parse(&self.status).ok_or_else(|| {
            EngineError::storage(format!("unknown order status in storage: {}", self.status))
        })?;
        Ok(Order {
            id: self.id,
            product_id: self.product_id,
            quantity: self.quantity,
            status,
            created_at: self.created_at,
        })
    }
}

/// Map sqlx errors to the engine taxonomy (see module docs for the table).
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EngineError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EngineError::conflict(msg),
                Some("40001") | Some("40P01") | Some("55P03") | Some("57014") => {
                    EngineError::transient(msg)
                }
                _ => EngineError::storage(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            EngineError::transient(format!("{operation}: connection pool timed out"))
        }
        other => EngineError::storage(format!("{operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
