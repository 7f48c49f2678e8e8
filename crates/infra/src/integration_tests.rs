//! Engine behavior tests, run against the in-memory backend. The Postgres
//! backend implements the same contract on top of row locks and unique
//! constraints.

use std::sync::Arc;

use stockline_core::EngineError;
use stockline_orders::{DeleteOutcome, NewOrder, OrderStatus};
use stockline_products::NewProduct;

use crate::engine::{Engine, InMemoryEngine, WebhookOutcome};

async fn engine_with_product(stock: i32) -> (InMemoryEngine, i64) {
    let engine = InMemoryEngine::new();
    let product = engine
        .create_product(NewProduct {
            sku: "WIDGET-1".into(),
            name: "Widget".into(),
            price: 9.99,
            stock,
        })
        .await
        .unwrap();
    (engine, product.id)
}

async fn place_order(engine: &InMemoryEngine, product_id: i64, quantity: i32) -> i64 {
    engine
        .reserve_stock_and_create_order(NewOrder {
            product_id,
            quantity,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn reservation_decrements_stock_and_creates_pending_order() {
    let (engine, product_id) = engine_with_product(10).await;

    let order = engine
        .reserve_stock_and_create_order(NewOrder {
            product_id,
            quantity: 4,
        })
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.quantity, 4);
    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 6);
}

#[tokio::test]
async fn reservation_fails_cleanly_when_stock_is_short() {
    let (engine, product_id) = engine_with_product(3).await;

    let err = engine
        .reserve_stock_and_create_order(NewOrder {
            product_id,
            quantity: 4,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InsufficientStock));
    // Nothing was written: stock untouched, no order created.
    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 3);
    assert!(engine.get_order(1).await.unwrap().is_none());
}

#[tokio::test]
async fn reservation_for_unknown_product_is_not_found() {
    let engine = InMemoryEngine::new();
    let err = engine
        .reserve_stock_and_create_order(NewOrder {
            product_id: 99,
            quantity: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_reservations_never_oversell() {
    let (engine, product_id) = engine_with_product(5).await;
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .reserve_stock_and_create_order(NewOrder {
                    product_id,
                    quantity: 1,
                })
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(EngineError::InsufficientStock) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 5);
    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
}

#[tokio::test]
async fn cancellation_restores_stock_exactly_once() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 3).await;

    let order = engine
        .transition_order(order_id, OrderStatus::Canceled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 10);

    // Same-status repeat is an absorbed no-op, not a second restore.
    engine
        .transition_order(order_id, OrderStatus::Canceled)
        .await
        .unwrap()
        .unwrap();
    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 10);
}

#[tokio::test]
async fn canceling_an_order_whose_product_was_deleted_is_harmless() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 3).await;

    assert!(engine.delete_product(product_id).await.unwrap());

    let order = engine
        .transition_order(order_id, OrderStatus::Canceled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    assert!(engine.get_product(product_id).await.unwrap().is_none());
}

#[tokio::test]
async fn shipped_orders_cannot_be_canceled() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 5).await;

    engine
        .transition_order(order_id, OrderStatus::Paid)
        .await
        .unwrap()
        .unwrap();
    engine
        .transition_order(order_id, OrderStatus::Shipped)
        .await
        .unwrap()
        .unwrap();

    let err = engine
        .transition_order(order_id, OrderStatus::Canceled)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    // The reservation stands; no stock came back.
    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 5);
}

#[tokio::test]
async fn transition_of_unknown_order_is_none() {
    let engine = InMemoryEngine::new();
    let result = engine
        .transition_order(42, OrderStatus::Paid)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn delete_pending_order_erases_it_and_restores_stock() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 4).await;

    let outcome = engine.delete_or_downgrade_order(order_id).await.unwrap();
    assert_eq!(outcome, Some(DeleteOutcome::Deleted));
    assert!(engine.get_order(order_id).await.unwrap().is_none());
    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 10);
}

#[tokio::test]
async fn delete_paid_order_downgrades_to_canceled() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 4).await;
    engine
        .transition_order(order_id, OrderStatus::Paid)
        .await
        .unwrap()
        .unwrap();

    let outcome = engine.delete_or_downgrade_order(order_id).await.unwrap();
    assert_eq!(outcome, Some(DeleteOutcome::Downgraded));

    let order = engine.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 10);
}

#[tokio::test]
async fn delete_shipped_or_canceled_order_is_rejected() {
    let (engine, product_id) = engine_with_product(10).await;

    let shipped = place_order(&engine, product_id, 2).await;
    engine
        .transition_order(shipped, OrderStatus::Paid)
        .await
        .unwrap();
    engine
        .transition_order(shipped, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(
        engine.delete_or_downgrade_order(shipped).await.unwrap(),
        Some(DeleteOutcome::Rejected)
    );

    let canceled = place_order(&engine, product_id, 2).await;
    engine
        .transition_order(canceled, OrderStatus::Canceled)
        .await
        .unwrap();
    assert_eq!(
        engine.delete_or_downgrade_order(canceled).await.unwrap(),
        Some(DeleteOutcome::Rejected)
    );

    assert_eq!(engine.delete_or_downgrade_order(999).await.unwrap(), None);
}

#[tokio::test]
async fn webhook_applies_once_and_replays_are_inert() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 2).await;

    let first = engine
        .apply_payment_succeeded("evt_1", order_id)
        .await
        .unwrap();
    assert_eq!(first, WebhookOutcome::Applied);
    let order = engine.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    let replay = engine
        .apply_payment_succeeded("evt_1", order_id)
        .await
        .unwrap();
    assert_eq!(replay, WebhookOutcome::AlreadyProcessed);
    let order = engine.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn distinct_events_for_the_same_order_are_independent() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 2).await;

    engine
        .apply_payment_succeeded("evt_a", order_id)
        .await
        .unwrap();
    // A different event id is a first sighting; the PAID→PAID transition is
    // absorbed as a no-op.
    let second = engine
        .apply_payment_succeeded("evt_b", order_id)
        .await
        .unwrap();
    assert_eq!(second, WebhookOutcome::Applied);
}

#[tokio::test]
async fn webhook_for_unknown_order_does_not_touch_the_ledger() {
    let engine = InMemoryEngine::new();

    let err = engine.apply_payment_succeeded("evt_x", 123).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound));

    // The id was never recorded, so a later legitimate use still counts as a
    // first sighting.
    assert!(engine.try_record_event("evt_x").await.unwrap());
}

#[tokio::test]
async fn failed_transition_rolls_the_ledger_entry_back() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 2).await;
    engine
        .transition_order(order_id, OrderStatus::Paid)
        .await
        .unwrap();
    engine
        .transition_order(order_id, OrderStatus::Shipped)
        .await
        .unwrap();

    // SHIPPED→PAID is not a legal edge, so the apply fails after the ledger
    // insert and must compensate.
    let err = engine
        .apply_payment_succeeded("evt_late", order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    assert!(engine.try_record_event("evt_late").await.unwrap());
}

#[tokio::test]
async fn product_listing_pages_in_id_order() {
    let engine = InMemoryEngine::new();
    for i in 1..=5 {
        engine
            .create_product(NewProduct {
                sku: format!("SKU-{i}"),
                name: format!("Product {i}"),
                price: 1.0,
                stock: 1,
            })
            .await
            .unwrap();
    }

    let page = engine.list_products(2, 2).await.unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].sku, "SKU-3");
    assert_eq!(page.items[1].sku, "SKU-4");

    let tail = engine.list_products(3, 2).await.unwrap();
    assert_eq!(tail.items.len(), 1);
    assert_eq!(tail.items[0].sku, "SKU-5");
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let (engine, product_id) = engine_with_product(1).await;

    let err = engine
        .create_product(NewProduct {
            sku: "WIDGET-1".into(),
            name: "Copycat".into(),
            price: 2.0,
            stock: 0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    // Patching a product to its own sku is fine.
    let patched = engine
        .patch_product(
            product_id,
            stockline_products::ProductPatch {
                sku: Some("WIDGET-1".into()),
                name: None,
                price: Some(3.5),
                stock: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(patched.price, 3.5);
}

#[tokio::test]
async fn full_lifecycle_keeps_stock_consistent() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 5).await;

    engine
        .apply_payment_succeeded("evt_life", order_id)
        .await
        .unwrap();
    engine
        .transition_order(order_id, OrderStatus::Shipped)
        .await
        .unwrap()
        .unwrap();

    let err = engine
        .transition_order(order_id, OrderStatus::Canceled)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    let product = engine.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 5);
    let order = engine.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn reset_wipes_everything() {
    let (engine, product_id) = engine_with_product(10).await;
    let order_id = place_order(&engine, product_id, 1).await;
    engine.try_record_event("evt_r").await.unwrap();

    engine.reset().await.unwrap();

    assert!(engine.get_product(product_id).await.unwrap().is_none());
    assert!(engine.get_order(order_id).await.unwrap().is_none());
    assert!(engine.try_record_event("evt_r").await.unwrap());
}
