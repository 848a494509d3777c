//! # orderdesk-core: Pure Business Logic for OrderDesk
//!
//! This crate is the **heart** of OrderDesk. It holds the domain model of the
//! order/payment pipeline as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OrderDesk Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           External callers (HTTP layer, acquiring callbacks)    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          orderdesk-service (Transaction Coordinator)            │   │
//! │  │   create_order, create_payment, mark_paid, mark_failed, sweep   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ orderdesk-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   order   │  │ lifecycle │  │   │
//! │  │   │  Order    │  │   Money   │  │ OrderDraft│  │ Transition│  │   │
//! │  │   │  Payment  │  │           │  │ totals    │  │  tables   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  orderdesk-db (Database Layer)                  │   │
//! │  │         PostgreSQL row locks, in-memory store, migrations       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Location, Product, Stock, Order, Payment, Receipt)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`lifecycle`] - Declarative state machines for orders and payments
//! - [`order`] - Order aggregate construction and total derivation
//! - [`report`] - Daily statistics assembled from read-only aggregates
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use orderdesk_core::lifecycle::{self, OrderTransition};
//! use orderdesk_core::{Money, Order, OrderState};
//!
//! let mut order = Order::new("loc-1", chrono::Utc::now());
//! assert_eq!(order.state, OrderState::Created);
//!
//! lifecycle::apply(&mut order, OrderTransition::MarkPaid, chrono::Utc::now()).unwrap();
//! assert_eq!(order.state, OrderState::Paid);
//!
//! // Paid orders cannot be archived
//! assert!(lifecycle::apply(&mut order, OrderTransition::Archive, chrono::Utc::now()).is_err());
//! assert_eq!(order.total(), Money::zero());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lifecycle;
pub mod money;
pub mod order;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single order.
///
/// ## Business Reason
/// Bounds the number of Stock rows one order-creation transaction locks.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;
