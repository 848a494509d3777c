//! # Payment Coordinator
//!
//! CreatePayment, MarkPaid and MarkFailed, each one transaction that locks
//! the Order row first and then its Payment rows.
//!
//! ## Settlement
//! ```text
//! mark_paid(order)
//!      │
//!      ├── lock Order, lock Payments
//!      │
//!      ├── earliest PENDING found:
//!      │      Order   CREATED ──► PAID
//!      │      Payment PENDING ──► PAID
//!      │      other PENDING siblings ──► FAILED
//!      │      Receipt issued from the order's line items
//!      │
//!      ├── none pending, one PAID  → AlreadyPaid (duplicate callback, no write)
//!      └── none pending, none PAID → NoPendingPayment
//! ```
//!
//! Duplicate callbacks are success outcomes so an acquirer retrying its
//! notification never sees an error for work already done.

use chrono::Utc;
use orderdesk_core::lifecycle::{OrderTransition, PaymentTransition};
use orderdesk_core::validation::validate_order_id;
use orderdesk_core::{CoreError, OrderState, Payment, PaymentMethod, PaymentState, Receipt};
use orderdesk_db::{Store, StoreTx};
use std::sync::Arc;
use tracing::{debug, info};

use crate::acquiring::Acquiring;
use crate::error::ServiceResult;
use crate::flow::{advance_order, advance_payment};

/// Result of a settlement callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkPaidOutcome {
    /// The pending payment was settled and a receipt issued.
    Paid { payment: Payment, receipt: Receipt },
    /// The order was already paid; nothing changed.
    AlreadyPaid { payment: Payment },
}

/// Result of a failure callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkFailedOutcome {
    /// The order was cancelled and these payments failed.
    Failed { payments: Vec<Payment> },
    /// A payment had already failed and none is pending; nothing changed.
    AlreadyFailed,
}

/// Payment creation and settlement callbacks.
#[derive(Clone)]
pub struct PaymentService<S: Store> {
    store: S,
    acquiring: Arc<dyn Acquiring>,
}

impl<S: Store> PaymentService<S> {
    pub fn new(store: S, acquiring: Arc<dyn Acquiring>) -> Self {
        PaymentService { store, acquiring }
    }

    /// Opens a payment on an order, or returns the existing one for `method`.
    ///
    /// ## Errors
    /// - `OrderNotFound`
    /// - `AlreadyPaid` once any payment of the order is paid
    /// - `OrderNotOpen` when the order is no longer `Created`
    pub async fn create_payment(
        &self,
        order_id: &str,
        method: PaymentMethod,
    ) -> ServiceResult<Payment> {
        let order_id = validate_order_id(order_id)?;

        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_order(&order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.clone()))?;
        let payments = tx.lock_payments(&order_id).await?;

        if payments.iter().any(|p| p.state == PaymentState::Paid) {
            tx.rollback().await?;
            return Err(CoreError::AlreadyPaid { order_id }.into());
        }

        if let Some(existing) = payments.into_iter().find(|p| p.method == method) {
            tx.rollback().await?;
            debug!(order_id = %order_id, payment_id = %existing.id, "Returning existing payment");
            return Ok(existing);
        }

        if order.state != OrderState::Created {
            tx.rollback().await?;
            return Err(CoreError::OrderNotOpen {
                order_id,
                state: order.state.to_string(),
            }
            .into());
        }

        let mut payment = Payment::new(&order, method, Utc::now());
        payment.redirect_url = Some(self.acquiring.redirect_url(&payment).await);
        tx.insert_payment(&payment).await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            payment_id = %payment.id,
            method = %method,
            amount_cents = payment.amount_cents,
            "Payment created"
        );

        Ok(payment)
    }

    /// Settles the order's pending payment and issues its receipt.
    pub async fn mark_paid(&self, order_id: &str) -> ServiceResult<MarkPaidOutcome> {
        let order_id = validate_order_id(order_id)?;

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(&order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.clone()))?;
        let payments = tx.lock_payments(&order_id).await?;

        let (mut pending, rest): (Vec<Payment>, Vec<Payment>) = payments
            .into_iter()
            .partition(|p| p.state == PaymentState::Pending);

        if pending.is_empty() {
            tx.rollback().await?;
            return match rest.into_iter().find(|p| p.state == PaymentState::Paid) {
                Some(payment) => {
                    debug!(order_id = %order_id, payment_id = %payment.id, "Duplicate paid callback");
                    Ok(MarkPaidOutcome::AlreadyPaid { payment })
                }
                None => Err(CoreError::NoPendingPayment { order_id }.into()),
            };
        }

        let now = Utc::now();
        advance_order(&mut tx, &mut order, OrderTransition::MarkPaid, now).await?;

        let mut payment = pending.remove(0);
        advance_payment(&mut tx, &mut payment, PaymentTransition::MarkPaid, now).await?;

        for sibling in &mut pending {
            advance_payment(&mut tx, sibling, PaymentTransition::MarkFailed, now).await?;
        }

        let items = tx.order_items(&order_id).await?;
        let receipt = Receipt::issue(&payment, &items, now);
        tx.insert_receipt(&receipt).await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            payment_id = %payment.id,
            receipt_number = %receipt.receipt_number,
            siblings_failed = pending.len(),
            "Payment settled"
        );

        Ok(MarkPaidOutcome::Paid { payment, receipt })
    }

    /// Fails the order's pending payments and cancels the order.
    ///
    /// ## Errors
    /// - `AlreadyPaid` when a payment already succeeded
    /// - `NoPendingPayment` when nothing is pending and nothing has failed
    pub async fn mark_failed(&self, order_id: &str) -> ServiceResult<MarkFailedOutcome> {
        let order_id = validate_order_id(order_id)?;

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(&order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.clone()))?;
        let payments = tx.lock_payments(&order_id).await?;

        let (mut pending, rest): (Vec<Payment>, Vec<Payment>) = payments
            .into_iter()
            .partition(|p| p.state == PaymentState::Pending);

        if pending.is_empty() {
            tx.rollback().await?;
            if rest.iter().any(|p| p.state == PaymentState::Paid) {
                return Err(CoreError::AlreadyPaid { order_id }.into());
            }
            if rest.iter().any(|p| p.state == PaymentState::Failed) {
                debug!(order_id = %order_id, "Duplicate failed callback");
                return Ok(MarkFailedOutcome::AlreadyFailed);
            }
            return Err(CoreError::NoPendingPayment { order_id }.into());
        }

        let now = Utc::now();
        advance_order(&mut tx, &mut order, OrderTransition::MarkCancelled, now).await?;
        for payment in &mut pending {
            advance_payment(&mut tx, payment, PaymentTransition::MarkFailed, now).await?;
        }
        tx.commit().await?;

        info!(order_id = %order_id, payments_failed = pending.len(), "Order cancelled");

        Ok(MarkFailedOutcome::Failed { payments: pending })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn test_create_payment_is_idempotent_per_method() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 2).await;

        let first = fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();
        let second = fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.state, PaymentState::Pending);
        assert_eq!(first.amount_cents, order.total_cents);
        assert!(first.redirect_url.as_deref().unwrap().contains("/pay/"));
        assert_eq!(fx.store.payments(&order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payments_with_different_methods_coexist() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;

        let card = fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();
        let cash = fx.desk.payments.create_payment(&order.id, PaymentMethod::Cash).await.unwrap();

        assert_ne!(card.id, cash.id);
        assert_eq!(fx.store.payments(&order.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_payment_unknown_order() {
        let fx = Fixture::new().await;

        let err = fx.desk.payments.create_payment("missing", PaymentMethod::Cash).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_paid_settles_and_issues_receipt() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 2).await;
        let payment = fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();

        let outcome = fx.desk.payments.mark_paid(&order.id).await.unwrap();
        let MarkPaidOutcome::Paid { payment: paid, receipt } = outcome else {
            panic!("expected a settlement");
        };

        assert_eq!(paid.id, payment.id);
        assert_eq!(paid.state, PaymentState::Paid);
        assert!(paid.processed_at.is_some());
        assert_eq!(receipt.payment_id, payment.id);
        assert_eq!(receipt.total(), order.total());
        assert_eq!(fx.desk.orders.get_status(&order.id).await.unwrap(), OrderState::Paid);
    }

    #[tokio::test]
    async fn test_mark_paid_twice_keeps_one_receipt() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;
        fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();

        fx.desk.payments.mark_paid(&order.id).await.unwrap();
        let second = fx.desk.payments.mark_paid(&order.id).await.unwrap();

        assert!(matches!(second, MarkPaidOutcome::AlreadyPaid { .. }));
        let details = fx.desk.orders.get_order(&order.id).await.unwrap();
        assert_eq!(details.receipts.len(), 1);
        assert_eq!(
            details.payments.iter().filter(|p| p.state == PaymentState::Paid).count(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_paid_callbacks_settle_once() {
        let fx = std::sync::Arc::new(Fixture::new().await);
        let order = fx.order_of(&fx.tea, 1).await;
        fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let fx = fx.clone();
            let order_id = order.id.clone();
            handles.push(tokio::spawn(async move { fx.desk.payments.mark_paid(&order_id).await }));
        }

        let mut settled = 0;
        for handle in handles {
            if let MarkPaidOutcome::Paid { .. } = handle.await.unwrap().unwrap() {
                settled += 1;
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(fx.store.receipts(&order.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_method_creates_one_payment() {
        let fx = std::sync::Arc::new(Fixture::new().await);
        let order = fx.order_of(&fx.tea, 1).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let fx = fx.clone();
            let order_id = order.id.clone();
            handles.push(tokio::spawn(async move {
                fx.desk.payments.create_payment(&order_id, PaymentMethod::Card).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();

        assert_eq!(ids.len(), 1);
        let stored = fx.store.payments(&order.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, ids[0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_paid_callback_racing_sweep() {
        let fx = std::sync::Arc::new(Fixture::new().await);
        fx.set_stock(&fx.tea, 100, true).await;

        for _ in 0..20 {
            let order = fx.order_of(&fx.tea, 1).await;
            let payment = fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();

            let paid = {
                let fx = fx.clone();
                let order_id = order.id.clone();
                tokio::spawn(async move { fx.desk.payments.mark_paid(&order_id).await })
            };
            let sweep = {
                let fx = fx.clone();
                tokio::spawn(async move { fx.desk.sweeper.run(Utc::now()).await })
            };
            let paid = paid.await.unwrap();
            let report = sweep.await.unwrap().unwrap();

            let state = fx.desk.orders.get_status(&order.id).await.unwrap();
            let stored = fx.store.payments(&order.id).await.unwrap();
            let receipts = fx.store.receipts(&order.id).await.unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].id, payment.id);

            match state {
                OrderState::Paid => {
                    assert!(matches!(paid, Ok(MarkPaidOutcome::Paid { .. })), "got {paid:?}");
                    assert_eq!(stored[0].state, PaymentState::Paid);
                    assert_eq!(receipts.len(), 1);
                    assert_eq!(report.archived, 0);
                }
                OrderState::Archived => {
                    assert!(
                        matches!(paid, Err(ServiceError::Core(CoreError::NoPendingPayment { .. }))),
                        "got {paid:?}"
                    );
                    assert_eq!(stored[0].state, PaymentState::Failed);
                    assert!(receipts.is_empty());
                    assert_eq!(report.archived, 1);
                    assert_eq!(report.payments_failed, 1);
                }
                other => panic!("order ended in {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_mark_paid_fails_pending_siblings() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;
        let card = fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();
        let cash = fx.desk.payments.create_payment(&order.id, PaymentMethod::Cash).await.unwrap();

        fx.desk.payments.mark_paid(&order.id).await.unwrap();

        let payments = fx.store.payments(&order.id).await.unwrap();
        let state_of = |id: &str| payments.iter().find(|p| p.id == id).unwrap().state;
        assert_eq!(state_of(&card.id), PaymentState::Paid);
        assert_eq!(state_of(&cash.id), PaymentState::Failed);
    }

    #[tokio::test]
    async fn test_mark_paid_without_payment() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;

        let err = fx.desk.payments.mark_paid(&order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::NoPendingPayment { .. })));
        assert_eq!(fx.desk.orders.get_status(&order.id).await.unwrap(), OrderState::Created);
    }

    #[tokio::test]
    async fn test_paid_order_rejects_new_payments_and_failure() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;
        fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();
        fx.desk.payments.mark_paid(&order.id).await.unwrap();

        for method in PaymentMethod::ALL {
            let err = fx.desk.payments.create_payment(&order.id, method).await.unwrap_err();
            assert!(matches!(err, ServiceError::Core(CoreError::AlreadyPaid { .. })));
        }

        let err = fx.desk.payments.mark_failed(&order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::AlreadyPaid { .. })));
        assert_eq!(fx.desk.orders.get_status(&order.id).await.unwrap(), OrderState::Paid);
    }

    #[tokio::test]
    async fn test_mark_failed_cancels_order() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;
        fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();

        let outcome = fx.desk.payments.mark_failed(&order.id).await.unwrap();
        let MarkFailedOutcome::Failed { payments } = outcome else {
            panic!("expected failed payments");
        };
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].state, PaymentState::Failed);
        assert!(payments[0].processed_at.is_some());
        assert_eq!(
            fx.desk.orders.get_status(&order.id).await.unwrap(),
            OrderState::Cancelled
        );

        let again = fx.desk.payments.mark_failed(&order.id).await.unwrap();
        assert_eq!(again, MarkFailedOutcome::AlreadyFailed);
    }

    #[tokio::test]
    async fn test_mark_failed_without_payment() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;

        let err = fx.desk.payments.mark_failed(&order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::NoPendingPayment { .. })));
    }

    #[tokio::test]
    async fn test_existing_method_is_returned_after_cancellation() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;
        let card = fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();
        fx.desk.payments.mark_failed(&order.id).await.unwrap();

        let again = fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();
        assert_eq!(again.id, card.id);
        assert_eq!(again.state, PaymentState::Failed);

        let err = fx.desk.payments.create_payment(&order.id, PaymentMethod::Cash).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::OrderNotOpen { .. })));
    }
}
