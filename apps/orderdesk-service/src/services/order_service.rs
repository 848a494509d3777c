//! Order creation and order reads.

use chrono::Utc;
use orderdesk_core::order::{normalize_lines, OrderDraft, OrderLine};
use orderdesk_core::validation::{validate_location_code, validate_order_id};
use orderdesk_core::{CoreError, Order, OrderItem, OrderState, Payment, Product, Receipt};
use orderdesk_db::{Store, StoreTx};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::ServiceResult;
use crate::ledger;

/// A freshly committed order.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Everything stored about one order, read without locks.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub receipts: Vec<Receipt>,
}

/// Order creation and order status.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S) -> Self {
        OrderService { store }
    }

    /// Creates an order at `location_code`, reserving stock for every line.
    ///
    /// ## Steps (one transaction)
    /// 1. Resolve the location, fail fast if unknown
    /// 2. Resolve every barcode; any unknown barcode aborts
    /// 3. Lock all Stock rows, ascending by product id
    /// 4. Reserve in request order; the first short line aborts
    /// 5. Insert the order and its items, commit
    ///
    /// Repeated barcodes are merged into one line before anything is locked.
    pub async fn create_order(
        &self,
        location_code: &str,
        lines: &[OrderLine],
    ) -> ServiceResult<CreatedOrder> {
        let location_code = validate_location_code(location_code)?;
        let lines = normalize_lines(lines)?;

        let mut tx = self.store.begin().await?;
        let now = Utc::now();

        let location = tx
            .location_by_code(&location_code)
            .await?
            .ok_or_else(|| CoreError::LocationNotFound(location_code.clone()))?;

        let barcodes: Vec<String> = lines.iter().map(|l| l.barcode.clone()).collect();
        let by_barcode: HashMap<String, Product> = tx
            .products_by_barcodes(&barcodes)
            .await?
            .into_iter()
            .map(|p| (p.barcode.clone(), p))
            .collect();

        let mut resolved: Vec<(&Product, i64)> = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = by_barcode
                .get(&line.barcode)
                .ok_or_else(|| CoreError::ProductNotFound(line.barcode.clone()))?;
            resolved.push((product, line.quantity));
        }

        let products: Vec<&Product> = resolved.iter().map(|(p, _)| *p).collect();
        let mut rows = ledger::lock_rows(&mut tx, &location.id, &products).await?;
        debug!(location = %location.code, rows = rows.len(), "Stock rows locked");

        let mut draft = OrderDraft::new(&location, now);
        for (product, quantity) in resolved {
            let row = rows.remove(&product.id).flatten();
            ledger::reserve_locked(&mut tx, row, product, quantity, now).await?;
            draft.add_item(product, quantity, now);
        }

        let (order, items) = draft.finish();
        tx.insert_order(&order, &items).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            location = %location.code,
            lines = items.len(),
            total_cents = order.total_cents,
            "Order created"
        );

        Ok(CreatedOrder { order, items })
    }

    /// Current lifecycle state of an order.
    pub async fn get_status(&self, order_id: &str) -> ServiceResult<OrderState> {
        let order_id = validate_order_id(order_id)?;
        let order = self
            .store
            .order(&order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;
        Ok(order.state)
    }

    /// The order with its items, payments and receipts.
    pub async fn get_order(&self, order_id: &str) -> ServiceResult<OrderDetails> {
        let order_id = validate_order_id(order_id)?;
        let order = self
            .store
            .order(&order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.clone()))?;

        Ok(OrderDetails {
            items: self.store.order_items(&order_id).await?,
            payments: self.store.payments(&order_id).await?,
            receipts: self.store.receipts(&order_id).await?,
            order,
        })
    }
}
