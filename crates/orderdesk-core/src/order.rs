//! # Order Aggregate
//!
//! Builds an order and its line items, keeping the derived total in step
//! with every line-item mutation.
//!
//! ## Creation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Order Creation (pure half)                          │
//! │                                                                         │
//! │  [(barcode, qty), ...]                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  normalize_lines()  ← validate, merge repeated barcodes                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  (coordinator resolves products, locks stock in lock_sequence order)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OrderDraft::add_item() × N  ← price snapshot, total recomputed        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OrderDraft::finish() → (Order, Vec<OrderItem>)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{items_total, new_id, Location, Order, OrderItem, Product};
use crate::validation::{validate_barcode, validate_line_count, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

/// One requested line: a product barcode and how many units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub barcode: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(barcode: impl Into<String>, quantity: i64) -> Self {
        OrderLine {
            barcode: barcode.into(),
            quantity,
        }
    }
}

/// Validates requested lines and merges repeated barcodes.
///
/// The result keeps first-occurrence order, so errors later reported
/// "per line" follow what the caller sent.
///
/// ## Example
/// ```rust
/// use orderdesk_core::order::{normalize_lines, OrderLine};
///
/// let lines = normalize_lines(&[
///     OrderLine::new("A", 1),
///     OrderLine::new("B", 2),
///     OrderLine::new("A", 4),
/// ]).unwrap();
///
/// assert_eq!(lines, vec![OrderLine::new("A", 5), OrderLine::new("B", 2)]);
/// ```
pub fn normalize_lines(lines: &[OrderLine]) -> CoreResult<Vec<OrderLine>> {
    validate_line_count(lines.len())?;

    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        validate_quantity(line.quantity)?;
        let barcode = validate_barcode(&line.barcode)?;

        match merged.iter_mut().find(|existing| existing.barcode == barcode) {
            Some(existing) => {
                existing.quantity += line.quantity;
                if existing.quantity > MAX_ITEM_QUANTITY {
                    return Err(CoreError::QuantityTooLarge {
                        requested: existing.quantity,
                        max: MAX_ITEM_QUANTITY,
                    });
                }
            }
            None => merged.push(OrderLine {
                barcode,
                quantity: line.quantity,
            }),
        }
    }

    Ok(merged)
}

/// Orders products for row locking: ascending by product id.
///
/// Every order-creation attempt acquires its Stock rows in this sequence,
/// so two attempts over overlapping products can never wait on each other
/// in a cycle.
pub fn lock_sequence<'a>(products: impl IntoIterator<Item = &'a Product>) -> Vec<&'a Product> {
    let mut sorted: Vec<&Product> = products.into_iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted.dedup_by(|a, b| a.id == b.id);
    sorted
}

/// An order under construction.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    order: Order,
    items: Vec<OrderItem>,
}

impl OrderDraft {
    /// Starts an empty order at `location`.
    pub fn new(location: &Location, now: DateTime<Utc>) -> Self {
        OrderDraft {
            order: Order::new(location.id.clone(), now),
            items: Vec::new(),
        }
    }

    /// Appends a line for `product`, snapshotting its current price and name.
    pub fn add_item(&mut self, product: &Product, quantity: i64, now: DateTime<Utc>) -> &OrderItem {
        self.items.push(OrderItem {
            id: new_id(),
            order_id: self.order.id.clone(),
            product_id: product.id.clone(),
            barcode_snapshot: product.barcode.clone(),
            name_snapshot: product.name.clone(),
            quantity,
            price_cents: product.price_cents,
            created_at: now,
        });
        self.order.total_cents = items_total(&self.items).cents();
        self.order.updated_at = now;

        &self.items[self.items.len() - 1]
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Finishes the draft.
    pub fn finish(self) -> (Order, Vec<OrderItem>) {
        (self.order, self.items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
