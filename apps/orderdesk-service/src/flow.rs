//! Lifecycle transitions bound to persistence.
//!
//! A transition is applied in memory by the core engine and then written
//! through the open transaction. Saving an order recomputes its total from
//! its items; saving a payment writes its `processed_at`.

use chrono::{DateTime, Utc};
use orderdesk_core::lifecycle::{self, OrderTransition, PaymentTransition, Transitioned};
use orderdesk_core::{Order, OrderState, Payment, PaymentState};
use orderdesk_db::StoreTx;

use crate::error::ServiceResult;

/// Applies `transition` to `order` and persists it.
pub async fn advance_order<T: StoreTx>(
    tx: &mut T,
    order: &mut Order,
    transition: OrderTransition,
    now: DateTime<Utc>,
) -> ServiceResult<Transitioned<OrderState>> {
    let moved = lifecycle::apply(order, transition, now)?;
    tx.save_order(order).await?;
    Ok(moved)
}

/// Applies `transition` to `payment` and persists it.
pub async fn advance_payment<T: StoreTx>(
    tx: &mut T,
    payment: &mut Payment,
    transition: PaymentTransition,
    now: DateTime<Utc>,
) -> ServiceResult<Transitioned<PaymentState>> {
    let moved = lifecycle::apply(payment, transition, now)?;
    tx.save_payment(payment).await?;
    Ok(moved)
}
