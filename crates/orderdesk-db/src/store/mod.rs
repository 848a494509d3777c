//! # Transactional Store
//!
//! The storage seam the coordinator is written against.
//!
//! ## Two Halves
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Store                                StoreTx                           │
//! │  ─────                                ───────                           │
//! │  • lock-free reads (status, items,    • one explicit transaction        │
//! │    payments, receipts, reports)       • lock_* = exclusive row lock,    │
//! │  • catalog writes (seed, admin)         held until commit/rollback      │
//! │  • begin() ──────────────────────────►• writes visible to its own reads │
//! │                                       • commit(self) / rollback(self)   │
//! │                                       • drop without commit = rollback  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Implementations
//! - [`postgres::PgStore`] - `SELECT ... FOR UPDATE` inside a sqlx transaction
//! - [`memory::MemoryStore`] - per-row async mutexes with a wait timeout

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use orderdesk_core::report::{LocationTotals, ProductUnits};
use orderdesk_core::validation::validate_price_cents;
use orderdesk_core::{
    Location, Money, Order, OrderItem, OrderState, Payment, Product, Receipt, Stock,
};

use crate::error::{DbError, DbResult};

pub mod memory;
pub mod postgres;

/// Entry point to the store: lock-free reads and transaction creation.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    /// Opens a new write transaction.
    async fn begin(&self) -> DbResult<Self::Tx>;

    // =========================================================================
    // Lock-free reads
    // =========================================================================

    async fn order(&self, order_id: &str) -> DbResult<Option<Order>>;

    /// Items of an order, in insertion order.
    async fn order_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>>;

    /// Payments of an order, oldest first.
    async fn payments(&self, order_id: &str) -> DbResult<Vec<Payment>>;

    async fn receipts(&self, order_id: &str) -> DbResult<Vec<Receipt>>;

    /// Ids of orders in `state`, oldest first, optionally only those created
    /// before `created_before`.
    async fn order_ids_in_state(
        &self,
        state: OrderState,
        created_before: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<String>>;

    /// Active location by external code.
    async fn location_by_code(&self, code: &str) -> DbResult<Option<Location>>;

    /// Active product by barcode.
    async fn product_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>>;

    async fn stock(&self, location_id: &str, product_id: &str) -> DbResult<Option<Stock>>;

    // =========================================================================
    // Reporting reads (UTC calendar day of Order.created_at)
    // =========================================================================

    /// Number of orders per state. States with no orders may be omitted.
    async fn order_counts_by_state(&self, day: NaiveDate) -> DbResult<Vec<(OrderState, i64)>>;

    /// Sum of totals of orders in `Paid`.
    async fn paid_revenue(&self, day: NaiveDate) -> DbResult<Money>;

    /// Units sold per product across orders in `Paid`.
    async fn units_sold_by_product(&self, day: NaiveDate) -> DbResult<Vec<ProductUnits>>;

    /// Order count (all states) and paid revenue per location.
    async fn location_totals(&self, day: NaiveDate) -> DbResult<Vec<LocationTotals>>;

    // =========================================================================
    // Catalog writes
    // =========================================================================

    async fn insert_location(&self, location: &Location) -> DbResult<()>;

    async fn insert_product(&self, product: &Product) -> DbResult<()>;

    /// Inserts or replaces the Stock row of (location, product).
    async fn put_stock(&self, stock: &Stock) -> DbResult<()>;

    /// Changes the current price. Existing line items keep their snapshot.
    async fn update_product_price(
        &self,
        product_id: &str,
        price: Money,
        now: DateTime<Utc>,
    ) -> DbResult<()>;
}

/// One open write transaction.
///
/// Lock acquisition order used by every caller:
/// Stock rows sorted by product id, or an Order row then its Payment rows
/// sorted by payment id.
#[async_trait]
pub trait StoreTx: Send + Sized {
    async fn location_by_code(&mut self, code: &str) -> DbResult<Option<Location>>;

    /// Active products carrying any of `barcodes`. Unknown barcodes are
    /// simply absent from the result.
    async fn products_by_barcodes(&mut self, barcodes: &[String]) -> DbResult<Vec<Product>>;

    /// Locks and returns the Stock row of (location, product).
    async fn lock_stock(&mut self, location_id: &str, product_id: &str) -> DbResult<Option<Stock>>;

    /// Writes back a Stock row locked by this transaction.
    async fn update_stock(&mut self, stock: &Stock) -> DbResult<()>;

    /// Inserts a new order together with its items.
    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> DbResult<()>;

    /// Locks and returns an order.
    async fn lock_order(&mut self, order_id: &str) -> DbResult<Option<Order>>;

    /// Locks every payment of an order (by ascending id) and returns them
    /// oldest first.
    async fn lock_payments(&mut self, order_id: &str) -> DbResult<Vec<Payment>>;

    async fn order_items(&mut self, order_id: &str) -> DbResult<Vec<OrderItem>>;

    /// Persists an order's state, recomputing `total_cents` from its items.
    async fn save_order(&mut self, order: &mut Order) -> DbResult<()>;

    async fn insert_payment(&mut self, payment: &Payment) -> DbResult<()>;

    /// Persists a payment's state and `processed_at`.
    async fn save_payment(&mut self, payment: &Payment) -> DbResult<()>;

    async fn insert_receipt(&mut self, receipt: &Receipt) -> DbResult<()>;

    async fn commit(self) -> DbResult<()>;

    async fn rollback(self) -> DbResult<()>;
}

/// Half-open UTC bounds `[start, end)` of a calendar day.
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
    (start, start + Duration::days(1))
}

/// Rejects a negative product price with the error the `price_cents`
/// CHECK constraint maps to.
pub(crate) fn check_product_price(cents: i64) -> DbResult<()> {
    validate_price_cents(cents).map_err(DbError::check_violation)
}
