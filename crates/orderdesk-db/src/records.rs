//! Row types for the PostgreSQL store.
//!
//! Each record mirrors one table row. State and method columns are TEXT and
//! are parsed into the core enums on the way out.

use chrono::{DateTime, Utc};
use orderdesk_core::{
    Location, Order, OrderItem, Payment, Product, Receipt, ReceiptLine, Stock,
};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocationRecord {
    pub id: String,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<LocationRecord> for Location {
    fn from(r: LocationRecord) -> Self {
        Location {
            id: r.id,
            code: r.code,
            name: r.name,
            is_active: r.is_active,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRecord {
    pub id: String,
    pub barcode: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRecord> for Product {
    fn from(r: ProductRecord) -> Self {
        Product {
            id: r.id,
            barcode: r.barcode,
            name: r.name,
            price_cents: r.price_cents,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRecord {
    pub location_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub available_for_sale: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<StockRecord> for Stock {
    fn from(r: StockRecord) -> Self {
        Stock {
            location_id: r.location_id,
            product_id: r.product_id,
            quantity: r.quantity,
            available_for_sale: r.available_for_sale,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: String,
    pub location_id: String,
    pub state: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = DbError;

    fn try_from(r: OrderRecord) -> DbResult<Self> {
        Ok(Order {
            state: r.state.parse().map_err(|e| DbError::invalid_row("Order", e))?,
            id: r.id,
            location_id: r.location_id,
            total_cents: r.total_cents,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRecord {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub barcode_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl From<OrderItemRecord> for OrderItem {
    fn from(r: OrderItemRecord) -> Self {
        OrderItem {
            id: r.id,
            order_id: r.order_id,
            product_id: r.product_id,
            barcode_snapshot: r.barcode_snapshot,
            name_snapshot: r.name_snapshot,
            quantity: r.quantity,
            price_cents: r.price_cents,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRecord {
    pub id: String,
    pub order_id: String,
    pub method: String,
    pub state: String,
    pub amount_cents: i64,
    pub redirect_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRecord> for Payment {
    type Error = DbError;

    fn try_from(r: PaymentRecord) -> DbResult<Self> {
        Ok(Payment {
            method: r.method.parse().map_err(|e| DbError::invalid_row("Payment", e))?,
            state: r.state.parse().map_err(|e| DbError::invalid_row("Payment", e))?,
            id: r.id,
            order_id: r.order_id,
            amount_cents: r.amount_cents,
            redirect_url: r.redirect_url,
            created_at: r.created_at,
            processed_at: r.processed_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiptRecord {
    pub id: String,
    pub payment_id: String,
    pub order_id: String,
    pub receipt_number: String,
    /// JSON array of receipt lines.
    pub lines: String,
    pub issued_at: DateTime<Utc>,
}

impl TryFrom<ReceiptRecord> for Receipt {
    type Error = DbError;

    fn try_from(r: ReceiptRecord) -> DbResult<Self> {
        let lines: Vec<ReceiptLine> = serde_json::from_str(&r.lines)?;
        Ok(Receipt {
            id: r.id,
            payment_id: r.payment_id,
            order_id: r.order_id,
            receipt_number: r.receipt_number,
            lines,
            issued_at: r.issued_at,
        })
    }
}

/// Collects rows through a fallible conversion.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> DbResult<Vec<T>>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}
