//! Integration tests for [`PgStore`] against a real PostgreSQL instance.
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they need a
//! reachable database. Each test works on freshly generated codes and ids,
//! so they can share one database.
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/orderdesk_test \
//!     cargo test -p orderdesk-db --test postgres -- --ignored
//! ```

use chrono::Utc;
use orderdesk_core::lifecycle::{self, PaymentTransition};
use orderdesk_core::{
    new_id, Location, Money, Order, OrderItem, Payment, PaymentMethod, PaymentState, Product,
    Receipt, Stock,
};
use orderdesk_db::{Database, DbConfig, DbError, PgStore, Store, StoreTx};
use std::time::Duration;

async fn connect(lock_timeout: Duration) -> Database {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/orderdesk_test".to_string());
    Database::new(DbConfig::new(url).max_connections(4).lock_timeout(lock_timeout))
        .await
        .expect("Failed to connect to PostgreSQL")
}

/// A new location and product with `quantity` units on hand.
async fn stocked(store: &PgStore, quantity: i64) -> (Location, Product) {
    let now = Utc::now();
    let suffix = &new_id()[..8];

    let location = Location::new(format!("T-{suffix}"), "Test counter", now);
    store.insert_location(&location).await.unwrap();

    let product = Product::new(format!("B-{suffix}"), "Test item", Money::from_cents(250), now);
    store.insert_product(&product).await.unwrap();

    store
        .put_stock(&Stock {
            location_id: location.id.clone(),
            product_id: product.id.clone(),
            quantity,
            available_for_sale: true,
            updated_at: now,
        })
        .await
        .unwrap();

    (location, product)
}

fn item_for(order: &Order, product: &Product, quantity: i64) -> OrderItem {
    OrderItem {
        id: new_id(),
        order_id: order.id.clone(),
        product_id: product.id.clone(),
        barcode_snapshot: product.barcode.clone(),
        name_snapshot: product.name.clone(),
        quantity,
        price_cents: product.price_cents,
        created_at: order.created_at,
    }
}

#[tokio::test]
#[ignore]
async fn test_uncommitted_stock_change_is_invisible_and_rolled_back() {
    let db = connect(Duration::from_secs(5)).await;
    let store = db.store();
    let (location, product) = stocked(&store, 5).await;

    let mut tx = store.begin().await.unwrap();
    let mut row = tx.lock_stock(&location.id, &product.id).await.unwrap().unwrap();
    row.quantity -= 3;
    tx.update_stock(&row).await.unwrap();

    let outside = store.stock(&location.id, &product.id).await.unwrap().unwrap();
    assert_eq!(outside.quantity, 5);

    tx.rollback().await.unwrap();
    let after = store.stock(&location.id, &product.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, 5);
}

#[tokio::test]
#[ignore]
async fn test_lock_wait_times_out_as_busy() {
    let db = connect(Duration::from_millis(200)).await;
    let store = db.store();
    let (location, product) = stocked(&store, 5).await;

    let mut holder = store.begin().await.unwrap();
    holder.lock_stock(&location.id, &product.id).await.unwrap();

    let mut waiter = store.begin().await.unwrap();
    let err = waiter.lock_stock(&location.id, &product.id).await.unwrap_err();
    assert!(matches!(err, DbError::Busy { .. }), "got {err:?}");
    assert!(err.is_transient());

    holder.rollback().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_order_total_is_recomputed_on_save() {
    let db = connect(Duration::from_secs(5)).await;
    let store = db.store();
    let (location, product) = stocked(&store, 5).await;

    let order = Order::new(&location.id, Utc::now());
    let items = vec![item_for(&order, &product, 3)];

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order, &items).await.unwrap();
    let mut locked = tx.lock_order(&order.id).await.unwrap().unwrap();
    locked.total_cents = 0;
    tx.save_order(&mut locked).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(locked.total_cents, 750);
    let stored = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.total_cents, 750);
    let stored_items = store.order_items(&order.id).await.unwrap();
    assert_eq!(stored_items.len(), 1);
    assert_eq!(stored_items[0].id, items[0].id);
    assert_eq!(stored_items[0].price_cents, 250);
}

#[tokio::test]
#[ignore]
async fn test_second_paid_payment_is_rejected_and_receipt_round_trips() {
    let db = connect(Duration::from_secs(5)).await;
    let store = db.store();
    let (location, product) = stocked(&store, 5).await;

    let order = Order::new(&location.id, Utc::now());
    let items = vec![item_for(&order, &product, 2)];
    let card = Payment::new(&order, PaymentMethod::Card, Utc::now());
    let cash = Payment::new(&order, PaymentMethod::Cash, Utc::now());

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order, &items).await.unwrap();
    tx.insert_payment(&card).await.unwrap();
    tx.insert_payment(&cash).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.lock_order(&order.id).await.unwrap();
    let mut payments = tx.lock_payments(&order.id).await.unwrap();
    assert_eq!(payments.len(), 2);

    let mut first = payments.remove(0);
    lifecycle::apply(&mut first, PaymentTransition::MarkPaid, Utc::now()).unwrap();
    tx.save_payment(&first).await.unwrap();
    let receipt = Receipt::issue(&first, &items, Utc::now());
    tx.insert_receipt(&receipt).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let mut second = payments.remove(0);
    lifecycle::apply(&mut second, PaymentTransition::MarkPaid, Utc::now()).unwrap();
    let err = tx.save_payment(&second).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }), "got {err:?}");
    tx.rollback().await.unwrap();

    let stored = store.payments(&order.id).await.unwrap();
    assert_eq!(
        stored.iter().filter(|p| p.state == PaymentState::Paid).count(),
        1
    );
    let receipts = store.receipts(&order.id).await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].receipt_number, receipt.receipt_number);
    assert_eq!(receipts[0].lines, receipt.lines);
    assert_eq!(receipts[0].total(), Money::from_cents(500));
}

#[tokio::test]
#[ignore]
async fn test_negative_prices_are_rejected() {
    let db = connect(Duration::from_secs(5)).await;
    let store = db.store();
    let (_, product) = stocked(&store, 1).await;
    let now = Utc::now();

    let suffix = &new_id()[..8];
    let below_zero = Product::new(format!("N-{suffix}"), "Refund", Money::from_cents(-500), now);
    let err = store.insert_product(&below_zero).await.unwrap_err();
    assert!(matches!(err, DbError::CheckViolation { .. }), "got {err:?}");

    let err = store
        .update_product_price(&product.id, Money::from_cents(-1), now)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::CheckViolation { .. }), "got {err:?}");

    let kept = store.product_by_barcode(&product.barcode).await.unwrap().unwrap();
    assert_eq!(kept.price_cents, 250);
}
