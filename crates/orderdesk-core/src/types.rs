//! # Domain Types
//!
//! Core domain types used throughout OrderDesk.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Location     │   │     Product     │   │      Stock      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  location_id    │       │
//! │  │  code (business)│   │  barcode        │   │  product_id     │       │
//! │  │  is_active      │   │  price_cents    │   │  quantity       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │──►│   OrderItem     │   │    Receipt      │       │
//! │  │  state          │   │  price snapshot │   │  frozen lines   │       │
//! │  │  total_cents    │   └─────────────────┘   └────────▲────────┘       │
//! │  │                 │──►┌─────────────────┐            │                │
//! │  └─────────────────┘   │    Payment      │────────────┘                │
//! │                        │  state, method  │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every referenced entity has:
//! - `id`: UUID v4 - immutable, used for database relations and lock ordering
//! - Business ID: (location code, product barcode, receipt number) - what
//!   external callers send

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

/// Generates a new entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Location
// =============================================================================

/// A physical point of sale owning its own stock and orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    /// External code callers use to address the location (e.g., "POS1").
    pub code: String,
    pub name: String,
    /// Inactive locations resolve as not found. Existing orders are untouched.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Location {
    /// Creates an active location.
    pub fn new(code: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Location {
            id: new_id(),
            code: code.into(),
            name: name.into(),
            is_active: true,
            created_at: now,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// External barcode (EAN-13, UPC-A, etc.), unique across products.
    pub barcode: String,
    /// Display name, copied into receipts.
    pub name: String,
    /// Current price in cents. Copied into line items at order creation.
    pub price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an active product.
    pub fn new(
        barcode: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Product {
            id: new_id(),
            barcode: barcode.into(),
            name: name.into(),
            price_cents: price.cents(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Quantity of one product held at one location.
///
/// One row per (location, product). The quantity is only read-modify-written
/// while the row lock is held by the surrounding transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub location_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Rows switched off for sale never satisfy a reservation.
    pub available_for_sale: bool,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    /// Checks whether `requested` units can be taken from this row.
    pub fn can_reserve(&self, requested: i64) -> bool {
        self.available_for_sale && self.quantity >= requested
    }
}

// =============================================================================
// Order State
// =============================================================================

/// The lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Created with reserved stock, awaiting payment.
    #[default]
    Created,
    /// A payment succeeded.
    Paid,
    /// Payment failed or the order was cancelled.
    Cancelled,
    /// Expired by the archival sweep while still unpaid.
    Archived,
}

impl OrderState {
    /// All states, in lifecycle order.
    pub const ALL: [OrderState; 4] = [
        OrderState::Created,
        OrderState::Paid,
        OrderState::Cancelled,
        OrderState::Archived,
    ];

    /// Storage representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderState::Created => "created",
            OrderState::Paid => "paid",
            OrderState::Cancelled => "cancelled",
            OrderState::Archived => "archived",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "order_state".to_string(),
                allowed: OrderState::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order placed at a location.
///
/// `total_cents` is derived: it always equals the sum of the line totals of
/// the order's items and is recomputed whenever the order is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub location_id: String,
    pub state: OrderState,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an empty order in the initial state.
    pub fn new(location_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Order {
            id: new_id(),
            location_id: location_id.into(),
            state: OrderState::default(),
            total_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze product data at order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Barcode at time of order (frozen).
    pub barcode_snapshot: String,
    /// Product name at time of order (frozen).
    pub name_snapshot: String,
    /// Quantity ordered, always positive.
    pub quantity: i64,
    /// Unit price in cents at time of order (frozen).
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns quantity × price.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }
}

/// Sums the line totals of a set of items.
pub fn items_total(items: &[OrderItem]) -> Money {
    items.iter().map(OrderItem::line_total).sum()
}

// =============================================================================
// Payment State & Method
// =============================================================================

/// The lifecycle state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Waiting for the acquiring callback.
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentState {
    pub const ALL: [PaymentState; 3] = [PaymentState::Pending, PaymentState::Paid, PaymentState::Failed];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Paid => "paid",
            PaymentState::Failed => "failed",
        }
    }

    /// Paid and Failed payments get a processed timestamp.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, PaymentState::Paid | PaymentState::Failed)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "payment_state".to_string(),
                allowed: PaymentState::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment through the acquiring provider.
    Card,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 2] = [PaymentMethod::Cash, PaymentMethod::Card];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == normalized)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment attempt for an order.
///
/// An order may collect several attempts (one per method) but at most one of
/// them ever reaches `Paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub state: PaymentState,
    /// Order total at the time the payment was created.
    pub amount_cents: i64,
    /// Opaque redirect reference from the acquiring provider.
    pub redirect_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set exactly when the payment reaches a terminal state.
    pub processed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a pending payment for the order's current total.
    pub fn new(order: &Order, method: PaymentMethod, now: DateTime<Utc>) -> Self {
        Payment {
            id: new_id(),
            order_id: order.id.clone(),
            method,
            state: PaymentState::default(),
            amount_cents: order.total_cents,
            redirect_url: None,
            created_at: now,
            processed_at: None,
        }
    }

    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// One frozen line of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i64,
    pub price_cents: i64,
}

impl From<&OrderItem> for ReceiptLine {
    fn from(item: &OrderItem) -> Self {
        ReceiptLine {
            name: item.name_snapshot.clone(),
            quantity: item.quantity,
            price_cents: item.price_cents,
        }
    }
}

/// Proof of a successful payment.
///
/// Created exactly once, in the transaction that moves its payment to `Paid`,
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub payment_id: String,
    pub order_id: String,
    pub receipt_number: String,
    pub lines: Vec<ReceiptLine>,
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    /// Freezes the given line items into a new receipt for `payment`.
    pub fn issue(payment: &Payment, items: &[OrderItem], now: DateTime<Utc>) -> Self {
        Receipt {
            id: new_id(),
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            receipt_number: generate_receipt_number(now),
            lines: items.iter().map(ReceiptLine::from).collect(),
            issued_at: now,
        }
    }

    /// Sum of the frozen lines.
    pub fn total(&self) -> Money {
        self.lines
            .iter()
            .map(|line| Money::from_cents(line.price_cents).multiply_quantity(line.quantity))
            .sum()
    }
}

/// Generates a receipt number in format: `R-YYYYMMDD-<uuid>`
///
/// The UUID part keeps numbers unique without a shared counter.
fn generate_receipt_number(now: DateTime<Utc>) -> String {
    format!("R-{}-{}", now.format("%Y%m%d"), Uuid::new_v4().simple())
}

// =============================================================================
// Unit Tests
// =============================================================================
