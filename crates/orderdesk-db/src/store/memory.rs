//! In-memory implementation of [`Store`].
//!
//! Used as the test double for the coordinator. Row locks are simulated
//! with one `tokio::sync::Mutex` per row key, so concurrent transactions
//! contend on the same rows exactly as they would on PostgreSQL.
//!
//! ## Transaction Model
//! ```text
//! begin() ──► MemoryTx { held guards, staged writes }
//!               │
//!               ├── lock_*  : wait (bounded) on the row mutex, then read
//!               ├── writes  : staged, visible to this transaction's reads
//!               │
//!               ├── commit  : validate + apply staged writes, release guards
//!               └── drop / rollback : discard staged writes, release guards
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use orderdesk_core::report::{LocationTotals, ProductUnits};
use orderdesk_core::{
    Location, Money, Order, OrderItem, OrderState, Payment, Product, Receipt, Stock,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use tracing::debug;

use super::{check_product_price, day_bounds, Store, StoreTx};
use crate::error::{DbError, DbResult};

/// Default wait for a row lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Stock(String, String),
    Order(String),
    Payment(String),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Stock(location, product) => write!(f, "stock({location}, {product})"),
            RowKey::Order(id) => write!(f, "order({id})"),
            RowKey::Payment(id) => write!(f, "payment({id})"),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    locations: HashMap<String, Location>,
    products: HashMap<String, Product>,
    stock: HashMap<(String, String), Stock>,
    orders: HashMap<String, Order>,
    /// Insertion order is preserved.
    items: Vec<OrderItem>,
    payments: Vec<Payment>,
    receipts: Vec<Receipt>,
}

impl Tables {
    fn active_location_by_code(&self, code: &str) -> Option<Location> {
        self.locations
            .values()
            .find(|l| l.code == code && l.is_active)
            .cloned()
    }

    fn active_product_by_barcode(&self, barcode: &str) -> Option<Product> {
        self.products
            .values()
            .find(|p| p.barcode == barcode && p.is_active)
            .cloned()
    }

    fn orders_created_on(&self, day: NaiveDate) -> impl Iterator<Item = &Order> {
        let (start, end) = day_bounds(day);
        self.orders
            .values()
            .filter(move |o| o.created_at >= start && o.created_at < end)
    }
}

/// Thread-safe in-memory store.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    row_locks: Arc<Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>>,
    lock_timeout: Duration,
}

impl MemoryStore {
    /// Creates an empty store with [`DEFAULT_LOCK_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates an empty store whose row lock waits give up after `timeout`.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        MemoryStore {
            tables: Arc::new(Mutex::new(Tables::default())),
            row_locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout: timeout,
        }
    }

    fn row_mutex(&self, key: &RowKey) -> Arc<RowMutex<()>> {
        self.row_locks.lock().entry(key.clone()).or_default().clone()
    }

    /// Forgets the mutex of `key` once no transaction holds or awaits it.
    fn prune_row_lock(&self, key: &RowKey) {
        let mut locks = self.row_locks.lock();
        if locks.get(key).map_or(false, |m| Arc::strong_count(m) == 1) {
            locks.remove(key);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> DbResult<MemoryTx> {
        Ok(MemoryTx {
            store: self.clone(),
            held: HeldRows {
                store: self.clone(),
                guards: HashMap::new(),
            },
            writes: Vec::new(),
        })
    }

    async fn order(&self, order_id: &str) -> DbResult<Option<Order>> {
        Ok(self.tables.lock().orders.get(order_id).cloned())
    }

    async fn order_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        Ok(self
            .tables
            .lock()
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn payments(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .tables
            .lock()
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        sort_by_creation(&mut payments);
        Ok(payments)
    }

    async fn receipts(&self, order_id: &str) -> DbResult<Vec<Receipt>> {
        Ok(self
            .tables
            .lock()
            .receipts
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn order_ids_in_state(
        &self,
        state: OrderState,
        created_before: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<String>> {
        let tables = self.tables.lock();
        let mut orders: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| o.state == state)
            .filter(|o| created_before.map_or(true, |cutoff| o.created_at < cutoff))
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders.into_iter().map(|o| o.id.clone()).collect())
    }

    async fn location_by_code(&self, code: &str) -> DbResult<Option<Location>> {
        Ok(self.tables.lock().active_location_by_code(code))
    }

    async fn product_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        Ok(self.tables.lock().active_product_by_barcode(barcode))
    }

    async fn stock(&self, location_id: &str, product_id: &str) -> DbResult<Option<Stock>> {
        Ok(self
            .tables
            .lock()
            .stock
            .get(&(location_id.to_string(), product_id.to_string()))
            .cloned())
    }

    async fn order_counts_by_state(&self, day: NaiveDate) -> DbResult<Vec<(OrderState, i64)>> {
        let tables = self.tables.lock();
        let mut counts: HashMap<OrderState, i64> = HashMap::new();
        for order in tables.orders_created_on(day) {
            *counts.entry(order.state).or_default() += 1;
        }
        Ok(OrderState::ALL
            .into_iter()
            .filter_map(|s| counts.get(&s).map(|c| (s, *c)))
            .collect())
    }

    async fn paid_revenue(&self, day: NaiveDate) -> DbResult<Money> {
        let tables = self.tables.lock();
        Ok(tables
            .orders_created_on(day)
            .filter(|o| o.state == OrderState::Paid)
            .map(Order::total)
            .sum())
    }

    async fn units_sold_by_product(&self, day: NaiveDate) -> DbResult<Vec<ProductUnits>> {
        let tables = self.tables.lock();
        let paid: HashSet<&str> = tables
            .orders_created_on(day)
            .filter(|o| o.state == OrderState::Paid)
            .map(|o| o.id.as_str())
            .collect();

        let mut units: BTreeMap<&str, i64> = BTreeMap::new();
        for item in tables.items.iter().filter(|i| paid.contains(i.order_id.as_str())) {
            *units.entry(item.product_id.as_str()).or_default() += item.quantity;
        }

        Ok(units
            .into_iter()
            .map(|(product_id, units)| ProductUnits {
                product_id: product_id.to_string(),
                name: tables
                    .products
                    .get(product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                units,
            })
            .collect())
    }

    async fn location_totals(&self, day: NaiveDate) -> DbResult<Vec<LocationTotals>> {
        let tables = self.tables.lock();
        let mut totals: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
        for order in tables.orders_created_on(day) {
            let entry = totals.entry(order.location_id.as_str()).or_default();
            entry.0 += 1;
            if order.state == OrderState::Paid {
                entry.1 += order.total_cents;
            }
        }

        Ok(totals
            .into_iter()
            .filter_map(|(location_id, (orders, revenue_cents))| {
                tables.locations.get(location_id).map(|l| LocationTotals {
                    location_id: l.id.clone(),
                    location_code: l.code.clone(),
                    location_name: l.name.clone(),
                    orders,
                    revenue_cents,
                })
            })
            .collect())
    }

    async fn insert_location(&self, location: &Location) -> DbResult<()> {
        let mut tables = self.tables.lock();
        if tables.locations.values().any(|l| l.code == location.code) {
            return Err(DbError::duplicate("locations.code", &location.code));
        }
        tables.locations.insert(location.id.clone(), location.clone());
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> DbResult<()> {
        check_product_price(product.price_cents)?;
        let mut tables = self.tables.lock();
        if tables.products.values().any(|p| p.barcode == product.barcode) {
            return Err(DbError::duplicate("products.barcode", &product.barcode));
        }
        tables.products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn put_stock(&self, stock: &Stock) -> DbResult<()> {
        let mut tables = self.tables.lock();
        if !tables.locations.contains_key(&stock.location_id)
            || !tables.products.contains_key(&stock.product_id)
        {
            return Err(DbError::ForeignKeyViolation {
                message: format!("stock({}, {})", stock.location_id, stock.product_id),
            });
        }
        tables.stock.insert(
            (stock.location_id.clone(), stock.product_id.clone()),
            stock.clone(),
        );
        Ok(())
    }

    async fn update_product_price(
        &self,
        product_id: &str,
        price: Money,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        check_product_price(price.cents())?;
        let mut tables = self.tables.lock();
        let product = tables
            .products
            .get_mut(product_id)
            .ok_or_else(|| DbError::not_found("Product", product_id))?;
        product.price_cents = price.cents();
        product.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug)]
enum Write {
    Stock(Stock),
    NewOrder(Order, Vec<OrderItem>),
    Order(Order),
    NewPayment(Payment),
    Payment(Payment),
    NewReceipt(Receipt),
}

/// Row guards of one transaction.
///
/// Dropping releases every guard, then prunes the released rows from the
/// store's lock table.
struct HeldRows {
    store: MemoryStore,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
}

impl Drop for HeldRows {
    fn drop(&mut self) {
        let released: Vec<RowKey> = self.guards.drain().map(|(key, _)| key).collect();
        for key in &released {
            self.store.prune_row_lock(key);
        }
    }
}

/// An open in-memory transaction. Dropping it rolls back.
pub struct MemoryTx {
    store: MemoryStore,
    held: HeldRows,
    writes: Vec<Write>,
}

impl MemoryTx {
    async fn lock_row(&mut self, key: RowKey) -> DbResult<()> {
        if self.held.guards.contains_key(&key) {
            return Ok(());
        }

        let mutex = self.store.row_mutex(&key);
        let acquired = tokio::time::timeout(self.store.lock_timeout, mutex.lock_owned()).await;
        let guard = match acquired {
            Ok(guard) => guard,
            Err(_) => {
                self.store.prune_row_lock(&key);
                return Err(DbError::busy(format!("lock wait timeout on {key}")));
            }
        };

        debug!(row = %key, "Row locked");
        self.held.guards.insert(key, guard);
        Ok(())
    }

    fn staged_stock(&self, location_id: &str, product_id: &str) -> Option<Stock> {
        self.writes.iter().rev().find_map(|w| match w {
            Write::Stock(s) if s.location_id == location_id && s.product_id == product_id => {
                Some(s.clone())
            }
            _ => None,
        })
    }

    fn staged_order(&self, order_id: &str) -> Option<Order> {
        self.writes.iter().rev().find_map(|w| match w {
            Write::Order(o) | Write::NewOrder(o, _) if o.id == order_id => Some(o.clone()),
            _ => None,
        })
    }

    fn items_of(&self, order_id: &str) -> Vec<OrderItem> {
        let mut items: Vec<OrderItem> = self
            .store
            .tables
            .lock()
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        for write in &self.writes {
            if let Write::NewOrder(o, new_items) = write {
                if o.id == order_id {
                    items.extend(new_items.iter().cloned());
                }
            }
        }
        items
    }

    fn payments_of(&self, order_id: &str) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .store
            .tables
            .lock()
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        for write in &self.writes {
            match write {
                Write::NewPayment(p) if p.order_id == order_id => payments.push(p.clone()),
                Write::Payment(p) if p.order_id == order_id => {
                    if let Some(existing) = payments.iter_mut().find(|e| e.id == p.id) {
                        *existing = p.clone();
                    }
                }
                _ => {}
            }
        }
        sort_by_creation(&mut payments);
        payments
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn location_by_code(&mut self, code: &str) -> DbResult<Option<Location>> {
        Ok(self.store.tables.lock().active_location_by_code(code))
    }

    async fn products_by_barcodes(&mut self, barcodes: &[String]) -> DbResult<Vec<Product>> {
        let tables = self.store.tables.lock();
        Ok(barcodes
            .iter()
            .filter_map(|b| tables.active_product_by_barcode(b))
            .collect())
    }

    async fn lock_stock(&mut self, location_id: &str, product_id: &str) -> DbResult<Option<Stock>> {
        self.lock_row(RowKey::Stock(location_id.to_string(), product_id.to_string()))
            .await?;

        if let Some(staged) = self.staged_stock(location_id, product_id) {
            return Ok(Some(staged));
        }
        Ok(self
            .store
            .tables
            .lock()
            .stock
            .get(&(location_id.to_string(), product_id.to_string()))
            .cloned())
    }

    async fn update_stock(&mut self, stock: &Stock) -> DbResult<()> {
        if stock.quantity < 0 {
            return Err(DbError::check_violation(format!(
                "stock quantity would become negative: {}",
                stock.quantity
            )));
        }
        self.writes.push(Write::Stock(stock.clone()));
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        self.writes.push(Write::NewOrder(order.clone(), items.to_vec()));
        Ok(())
    }

    async fn lock_order(&mut self, order_id: &str) -> DbResult<Option<Order>> {
        self.lock_row(RowKey::Order(order_id.to_string())).await?;

        if let Some(staged) = self.staged_order(order_id) {
            return Ok(Some(staged));
        }
        Ok(self.store.tables.lock().orders.get(order_id).cloned())
    }

    async fn lock_payments(&mut self, order_id: &str) -> DbResult<Vec<Payment>> {
        let mut ids: Vec<String> = self.payments_of(order_id).into_iter().map(|p| p.id).collect();
        ids.sort();
        for id in ids {
            self.lock_row(RowKey::Payment(id)).await?;
        }
        // Re-read after locking so the latest committed states are returned.
        Ok(self.payments_of(order_id))
    }

    async fn order_items(&mut self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        Ok(self.items_of(order_id))
    }

    async fn save_order(&mut self, order: &mut Order) -> DbResult<()> {
        let exists = self.staged_order(&order.id).is_some()
            || self.store.tables.lock().orders.contains_key(&order.id);
        if !exists {
            return Err(DbError::not_found("Order", &order.id));
        }

        order.total_cents = orderdesk_core::items_total(&self.items_of(&order.id)).cents();
        self.writes.push(Write::Order(order.clone()));
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> DbResult<()> {
        self.writes.push(Write::NewPayment(payment.clone()));
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> DbResult<()> {
        if !self.payments_of(&payment.order_id).iter().any(|p| p.id == payment.id) {
            return Err(DbError::not_found("Payment", &payment.id));
        }
        self.writes.push(Write::Payment(payment.clone()));
        Ok(())
    }

    async fn insert_receipt(&mut self, receipt: &Receipt) -> DbResult<()> {
        self.writes.push(Write::NewReceipt(receipt.clone()));
        Ok(())
    }

    async fn commit(self) -> DbResult<()> {
        let MemoryTx { store, held, writes } = self;

        {
            let mut tables = store.tables.lock();
            check_constraints(&tables, &writes)?;
            for write in writes {
                apply(&mut tables, write);
            }
        }

        // Guards are released only after the writes are visible.
        drop(held);
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        Ok(())
    }
}

fn sort_by_creation(payments: &mut [Payment]) {
    payments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Mirrors the UNIQUE constraints of the relational schema.
fn check_constraints(tables: &Tables, writes: &[Write]) -> DbResult<()> {
    let mut paid_orders: HashSet<&str> = tables
        .payments
        .iter()
        .filter(|p| p.state == orderdesk_core::PaymentState::Paid)
        .map(|p| p.order_id.as_str())
        .collect();
    let mut receipt_payments: HashSet<&str> =
        tables.receipts.iter().map(|r| r.payment_id.as_str()).collect();
    let mut receipt_numbers: HashSet<&str> =
        tables.receipts.iter().map(|r| r.receipt_number.as_str()).collect();

    for write in writes {
        match write {
            Write::NewOrder(order, _) if tables.orders.contains_key(&order.id) => {
                return Err(DbError::duplicate("orders.id", &order.id));
            }
            Write::NewPayment(p) | Write::Payment(p)
                if p.state == orderdesk_core::PaymentState::Paid =>
            {
                let already = tables
                    .payments
                    .iter()
                    .any(|e| e.id == p.id && e.state == orderdesk_core::PaymentState::Paid);
                if !already && !paid_orders.insert(p.order_id.as_str()) {
                    return Err(DbError::duplicate("payments.order_id (paid)", &p.order_id));
                }
            }
            Write::NewReceipt(r) => {
                if !receipt_payments.insert(r.payment_id.as_str()) {
                    return Err(DbError::duplicate("receipts.payment_id", &r.payment_id));
                }
                if !receipt_numbers.insert(r.receipt_number.as_str()) {
                    return Err(DbError::duplicate("receipts.receipt_number", &r.receipt_number));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn apply(tables: &mut Tables, write: Write) {
    match write {
        Write::Stock(stock) => {
            tables
                .stock
                .insert((stock.location_id.clone(), stock.product_id.clone()), stock);
        }
        Write::NewOrder(order, items) => {
            tables.orders.insert(order.id.clone(), order);
            tables.items.extend(items);
        }
        Write::Order(order) => {
            tables.orders.insert(order.id.clone(), order);
        }
        Write::NewPayment(payment) => tables.payments.push(payment),
        Write::Payment(payment) => {
            if let Some(existing) = tables.payments.iter_mut().find(|p| p.id == payment.id) {
                *existing = payment;
            }
        }
        Write::NewReceipt(receipt) => tables.receipts.push(receipt),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
