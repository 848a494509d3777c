//! Shared fixture for service tests: one location with a small catalog on
//! the in-memory store.

use chrono::Utc;
use orderdesk_core::order::OrderLine;
use orderdesk_core::{Location, Money, Order, OrderState, Product, Stock};
use orderdesk_db::{MemoryStore, Store};
use std::sync::Arc;
use std::time::Duration;

use crate::{FakeAcquiring, OrderDesk};

pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub desk: OrderDesk<MemoryStore>,
    /// `POS1`
    pub location: Location,
    /// 5 units on hand
    pub tea: Product,
    /// 10 units on hand
    pub bun: Product,
    /// Active, but no Stock row at `POS1`
    pub unstocked: Product,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_store(MemoryStore::with_lock_timeout(Duration::from_secs(5))).await
    }

    pub async fn with_store(store: MemoryStore) -> Self {
        let now = Utc::now();

        let location = Location::new("POS1", "Front counter", now);
        store.insert_location(&location).await.unwrap();

        let tea = Product::new("4600000000017", "Black Tea", Money::from_cents(350), now);
        let bun = Product::new("4600000000024", "Cinnamon Bun", Money::from_cents(240), now);
        let unstocked = Product::new("4600000000031", "Gift Card", Money::from_cents(1000), now);
        for product in [&tea, &bun, &unstocked] {
            store.insert_product(product).await.unwrap();
        }

        let desk = OrderDesk::new(store.clone(), Arc::new(FakeAcquiring::new("https://acq.test")));
        let fx = Fixture {
            store,
            desk,
            location,
            tea,
            bun,
            unstocked,
        };
        fx.set_stock(&fx.tea, 5, true).await;
        fx.set_stock(&fx.bun, 10, true).await;
        fx
    }

    pub async fn set_stock(&self, product: &Product, quantity: i64, available_for_sale: bool) {
        self.store
            .put_stock(&Stock {
                location_id: self.location.id.clone(),
                product_id: product.id.clone(),
                quantity,
                available_for_sale,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    pub async fn stock_of(&self, product: &Product) -> i64 {
        self.store
            .stock(&self.location.id, &product.id)
            .await
            .unwrap()
            .map(|s| s.quantity)
            .unwrap_or_default()
    }

    /// Creates a one-line order at `POS1`.
    pub async fn order_of(&self, product: &Product, quantity: i64) -> Order {
        self.desk
            .orders
            .create_order("POS1", &[OrderLine::new(&product.barcode, quantity)])
            .await
            .unwrap()
            .order
    }

    pub async fn all_order_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for state in OrderState::ALL {
            ids.extend(self.store.order_ids_in_state(state, None).await.unwrap());
        }
        ids
    }
}
