//! PostgreSQL implementation of [`Store`].
//!
//! Row locks are `SELECT ... FOR UPDATE` inside an explicit transaction.
//! `lock_timeout` is set per transaction, so a lock wait past the configured
//! bound fails with SQLSTATE 55P03 and surfaces as `DbError::Busy`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use orderdesk_core::report::{LocationTotals, ProductUnits};
use orderdesk_core::{
    Location, Money, Order, OrderItem, OrderState, Payment, Product, Receipt, Stock,
};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;
use std::time::Duration;
use tracing::debug;

use super::{check_product_price, day_bounds, Store, StoreTx};
use crate::error::{DbError, DbResult};
use crate::records::{
    convert_all, LocationRecord, OrderItemRecord, OrderRecord, PaymentRecord, ProductRecord,
    ReceiptRecord, StockRecord,
};

// Column lists shared by reads inside and outside transactions.
const ORDER_COLUMNS: &str = "id, location_id, state, total_cents, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, barcode_snapshot, name_snapshot, \
                            quantity, price_cents, created_at";
const PAYMENT_COLUMNS: &str = "id, order_id, method, state, amount_cents, redirect_url, \
                               created_at, processed_at";

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        PgStore { pool, lock_timeout }
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> DbResult<PgTx> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        Ok(PgTx { tx })
    }

    async fn order(&self, order_id: &str) -> DbResult<Option<Order>> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Order::try_from).transpose()
    }

    async fn order_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let records = sqlx::query_as::<_, OrderItemRecord>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY seq"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(OrderItem::from).collect())
    }

    async fn payments(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let records = sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(records)
    }

    async fn receipts(&self, order_id: &str) -> DbResult<Vec<Receipt>> {
        let records = sqlx::query_as::<_, ReceiptRecord>(
            r#"
            SELECT id, payment_id, order_id, receipt_number, lines, issued_at
            FROM receipts
            WHERE order_id = $1
            ORDER BY issued_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(records)
    }

    async fn order_ids_in_state(
        &self,
        state: OrderState,
        created_before: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM orders
            WHERE state = $1
              AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(state.as_str())
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn location_by_code(&self, code: &str) -> DbResult<Option<Location>> {
        let record = sqlx::query_as::<_, LocationRecord>(
            r#"
            SELECT id, code, name, is_active, created_at
            FROM locations
            WHERE code = $1 AND is_active = true
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Location::from))
    }

    async fn product_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let record = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, barcode, name, price_cents, is_active, created_at, updated_at
            FROM products
            WHERE barcode = $1 AND is_active = true
            "#,
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Product::from))
    }

    async fn stock(&self, location_id: &str, product_id: &str) -> DbResult<Option<Stock>> {
        let record = sqlx::query_as::<_, StockRecord>(
            r#"
            SELECT location_id, product_id, quantity, available_for_sale, updated_at
            FROM stock
            WHERE location_id = $1 AND product_id = $2
            "#,
        )
        .bind(location_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Stock::from))
    }

    async fn order_counts_by_state(&self, day: NaiveDate) -> DbResult<Vec<(OrderState, i64)>> {
        let (start, end) = day_bounds(day);
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT state, COUNT(*)
            FROM orders
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY state
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(state, count)| {
                let state = state
                    .parse::<OrderState>()
                    .map_err(|e| DbError::invalid_row("Order", e))?;
                Ok((state, count))
            })
            .collect()
    }

    async fn paid_revenue(&self, day: NaiveDate) -> DbResult<Money> {
        let (start, end) = day_bounds(day);
        let cents = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(total_cents), 0)::BIGINT
            FROM orders
            WHERE state = 'paid' AND created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }

    async fn units_sold_by_product(&self, day: NaiveDate) -> DbResult<Vec<ProductUnits>> {
        let (start, end) = day_bounds(day);
        let rows = sqlx::query_as::<_, (String, String, i64)>(
            r#"
            SELECT p.id, p.name, SUM(oi.quantity)::BIGINT AS units
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN products p ON p.id = oi.product_id
            WHERE o.state = 'paid' AND o.created_at >= $1 AND o.created_at < $2
            GROUP BY p.id, p.name
            ORDER BY units DESC, p.name
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, name, units)| ProductUnits {
                product_id,
                name,
                units,
            })
            .collect())
    }

    async fn location_totals(&self, day: NaiveDate) -> DbResult<Vec<LocationTotals>> {
        let (start, end) = day_bounds(day);
        let rows = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            r#"
            SELECT l.id, l.code, l.name,
                   COUNT(o.id) AS orders,
                   COALESCE(SUM(o.total_cents) FILTER (WHERE o.state = 'paid'), 0)::BIGINT
            FROM orders o
            JOIN locations l ON l.id = o.location_id
            WHERE o.created_at >= $1 AND o.created_at < $2
            GROUP BY l.id, l.code, l.name
            ORDER BY l.code
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(location_id, location_code, location_name, orders, revenue_cents)| {
                    LocationTotals {
                        location_id,
                        location_code,
                        location_name,
                        orders,
                        revenue_cents,
                    }
                },
            )
            .collect())
    }

    async fn insert_location(&self, location: &Location) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (id, code, name, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&location.id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(location.is_active)
        .bind(location.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> DbResult<()> {
        check_product_price(product.price_cents)?;
        sqlx::query(
            r#"
            INSERT INTO products (id, barcode, name, price_cents, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn put_stock(&self, stock: &Stock) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock (location_id, product_id, quantity, available_for_sale, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (location_id, product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                available_for_sale = EXCLUDED.available_for_sale,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&stock.location_id)
        .bind(&stock.product_id)
        .bind(stock.quantity)
        .bind(stock.available_for_sale)
        .bind(stock.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_product_price(
        &self,
        product_id: &str,
        price: Money,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        check_product_price(price.cents())?;
        let result = sqlx::query("UPDATE products SET price_cents = $2, updated_at = $3 WHERE id = $1")
            .bind(product_id)
            .bind(price.cents())
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }
        Ok(())
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// An open PostgreSQL transaction. Dropping it rolls back.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn location_by_code(&mut self, code: &str) -> DbResult<Option<Location>> {
        let record = sqlx::query_as::<_, LocationRecord>(
            r#"
            SELECT id, code, name, is_active, created_at
            FROM locations
            WHERE code = $1 AND is_active = true
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record.map(Location::from))
    }

    async fn products_by_barcodes(&mut self, barcodes: &[String]) -> DbResult<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, barcode, name, price_cents, is_active, created_at, updated_at
            FROM products
            WHERE barcode = ANY($1) AND is_active = true
            "#,
        )
        .bind(barcodes)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records.into_iter().map(Product::from).collect())
    }

    async fn lock_stock(&mut self, location_id: &str, product_id: &str) -> DbResult<Option<Stock>> {
        debug!(location_id, product_id, "Locking stock row");
        let record = sqlx::query_as::<_, StockRecord>(
            r#"
            SELECT location_id, product_id, quantity, available_for_sale, updated_at
            FROM stock
            WHERE location_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(location_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record.map(Stock::from))
    }

    async fn update_stock(&mut self, stock: &Stock) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE stock
            SET quantity = $3, available_for_sale = $4, updated_at = $5
            WHERE location_id = $1 AND product_id = $2
            "#,
        )
        .bind(&stock.location_id)
        .bind(&stock.product_id)
        .bind(stock.quantity)
        .bind(stock.available_for_sale)
        .bind(stock.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, location_id, state, total_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&order.id)
        .bind(&order.location_id)
        .bind(order.state.as_str())
        .bind(order.total_cents)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, barcode_snapshot, name_snapshot,
                    quantity, price_cents, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.barcode_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.price_cents)
            .bind(item.created_at)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn lock_order(&mut self, order_id: &str) -> DbResult<Option<Order>> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        record.map(Order::try_from).transpose()
    }

    async fn lock_payments(&mut self, order_id: &str) -> DbResult<Vec<Payment>> {
        // Lock in id order, then hand back in creation order.
        let records = sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY id FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut payments: Vec<Payment> = convert_all(records)?;
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(payments)
    }

    async fn order_items(&mut self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let records = sqlx::query_as::<_, OrderItemRecord>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY seq"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records.into_iter().map(OrderItem::from).collect())
    }

    async fn save_order(&mut self, order: &mut Order) -> DbResult<()> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE orders
            SET state = $2,
                updated_at = $3,
                total_cents = (
                    SELECT COALESCE(SUM(quantity * price_cents), 0)::BIGINT
                    FROM order_items WHERE order_id = $1
                )
            WHERE id = $1
            RETURNING total_cents
            "#,
        )
        .bind(&order.id)
        .bind(order.state.as_str())
        .bind(order.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| DbError::not_found("Order", &order.id))?;

        order.total_cents = total;
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, method, state, amount_cents, redirect_url,
                created_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method.as_str())
        .bind(payment.state.as_str())
        .bind(payment.amount_cents)
        .bind(&payment.redirect_url)
        .bind(payment.created_at)
        .bind(payment.processed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE payments SET state = $2, processed_at = $3 WHERE id = $1",
        )
        .bind(&payment.id)
        .bind(payment.state.as_str())
        .bind(payment.processed_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", &payment.id));
        }
        Ok(())
    }

    async fn insert_receipt(&mut self, receipt: &Receipt) -> DbResult<()> {
        let lines = serde_json::to_string(&receipt.lines)?;

        sqlx::query(
            r#"
            INSERT INTO receipts (id, payment_id, order_id, receipt_number, lines, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.payment_id)
        .bind(&receipt.order_id)
        .bind(&receipt.receipt_number)
        .bind(lines)
        .bind(receipt.issued_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
