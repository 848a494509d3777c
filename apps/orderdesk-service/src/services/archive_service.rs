//! # Archival Sweeper
//!
//! Moves abandoned orders out of `Created`.
//!
//! ```text
//! order_ids_in_state(Created, created_before?)     ← lock-free snapshot
//!      │
//!      ▼  for each id, its own transaction
//! lock Order ── gone or no longer Created → skip
//!      │
//!      ├── Order   CREATED ──► ARCHIVED
//!      └── every PENDING Payment ──► FAILED
//!      │
//!      ▼
//! commit; on error log, count, continue with the next order
//! ```
//!
//! Overlapping runs are safe: the second run to lock an order sees it is no
//! longer `Created` and skips it.

use chrono::{DateTime, Duration, Utc};
use orderdesk_core::lifecycle::{OrderTransition, PaymentTransition};
use orderdesk_core::{OrderState, PaymentState};
use orderdesk_db::{Store, StoreTx};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::ServiceResult;
use crate::flow::{advance_order, advance_payment};

/// Counters of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Orders found in `Created` when the run started.
    pub scanned: usize,
    pub archived: usize,
    pub payments_failed: usize,
    /// Orders that changed state between the scan and the lock.
    pub skipped: usize,
    /// Orders whose transaction errored; retried on the next run.
    pub failed: usize,
}

/// What happened to one order.
enum Swept {
    Archived { payments_failed: usize },
    Skipped,
}

/// Batch archival of orders left in `Created`.
#[derive(Clone)]
pub struct ArchiveSweeper<S: Store> {
    store: S,
    min_age: Option<Duration>,
}

impl<S: Store> ArchiveSweeper<S> {
    /// A sweeper that archives every `Created` order.
    pub fn new(store: S) -> Self {
        ArchiveSweeper { store, min_age: None }
    }

    /// Only archive orders created at least `min_age` before the run.
    pub fn with_min_age(mut self, min_age: Option<Duration>) -> Self {
        self.min_age = min_age;
        self
    }

    /// Runs one sweep. Per-order failures are counted, never returned.
    pub async fn run(&self, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let cutoff = self.min_age.map(|age| now - age);
        let ids = self.store.order_ids_in_state(OrderState::Created, cutoff).await?;

        let mut report = SweepReport {
            scanned: ids.len(),
            ..SweepReport::default()
        };
        info!(candidates = ids.len(), cutoff = ?cutoff, "Archive sweep started");

        for order_id in ids {
            match self.sweep_one(&order_id, now).await {
                Ok(Swept::Archived { payments_failed }) => {
                    report.archived += 1;
                    report.payments_failed += payments_failed;
                }
                Ok(Swept::Skipped) => report.skipped += 1,
                Err(e) if e.is_retryable() => {
                    warn!(order_id = %order_id, error = %e, "Order busy, left for next sweep");
                    report.failed += 1;
                }
                Err(e) => {
                    error!(order_id = %order_id, error = %e, "Failed to archive order");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            archived = report.archived,
            payments_failed = report.payments_failed,
            skipped = report.skipped,
            failed = report.failed,
            "Archive sweep finished"
        );

        Ok(report)
    }

    async fn sweep_one(&self, order_id: &str, now: DateTime<Utc>) -> ServiceResult<Swept> {
        let mut tx = self.store.begin().await?;

        let mut order = match tx.lock_order(order_id).await? {
            Some(order) if order.state == OrderState::Created => order,
            _ => {
                tx.rollback().await?;
                debug!(order_id = %order_id, "Order moved on before archival");
                return Ok(Swept::Skipped);
            }
        };

        advance_order(&mut tx, &mut order, OrderTransition::Archive, now).await?;

        let mut payments_failed = 0;
        for mut payment in tx.lock_payments(order_id).await? {
            if payment.state == PaymentState::Pending {
                advance_payment(&mut tx, &mut payment, PaymentTransition::MarkFailed, now).await?;
                payments_failed += 1;
            }
        }

        tx.commit().await?;
        Ok(Swept::Archived { payments_failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use orderdesk_core::PaymentMethod;
    use orderdesk_db::MemoryStore;

    #[tokio::test]
    async fn test_sweep_archives_created_and_fails_pending() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;
        fx.desk.payments.create_payment(&order.id, PaymentMethod::Card).await.unwrap();

        let report = fx.desk.sweeper.run(Utc::now()).await.unwrap();

        assert_eq!(report.archived, 1);
        assert_eq!(report.payments_failed, 1);
        assert_eq!(fx.desk.orders.get_status(&order.id).await.unwrap(), OrderState::Archived);
        let payments = fx.store.payments(&order.id).await.unwrap();
        assert_eq!(payments[0].state, PaymentState::Failed);
        assert!(payments[0].processed_at.is_some());
    }

    #[tokio::test]
    async fn test_sweep_leaves_paid_and_cancelled_orders_alone() {
        let fx = Fixture::new().await;

        let paid = fx.order_of(&fx.tea, 1).await;
        fx.desk.payments.create_payment(&paid.id, PaymentMethod::Card).await.unwrap();
        fx.desk.payments.mark_paid(&paid.id).await.unwrap();

        let cancelled = fx.order_of(&fx.bun, 1).await;
        fx.desk.payments.create_payment(&cancelled.id, PaymentMethod::Cash).await.unwrap();
        fx.desk.payments.mark_failed(&cancelled.id).await.unwrap();

        let before_paid = fx.store.order(&paid.id).await.unwrap().unwrap();
        let before_cancelled = fx.store.order(&cancelled.id).await.unwrap().unwrap();

        let report = fx.desk.sweeper.run(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert_eq!(fx.store.order(&paid.id).await.unwrap().unwrap(), before_paid);
        assert_eq!(fx.store.order(&cancelled.id).await.unwrap().unwrap(), before_cancelled);
    }

    #[tokio::test]
    async fn test_second_sweep_is_a_no_op() {
        let fx = Fixture::new().await;
        fx.order_of(&fx.tea, 1).await;

        let first = fx.desk.sweeper.run(Utc::now()).await.unwrap();
        let second = fx.desk.sweeper.run(Utc::now()).await.unwrap();

        assert_eq!(first.archived, 1);
        assert_eq!(second.scanned, 0);
    }

    #[tokio::test]
    async fn test_min_age_spares_recent_orders() {
        let fx = Fixture::new().await;
        let order = fx.order_of(&fx.tea, 1).await;

        let sweeper = ArchiveSweeper::new(fx.store.clone()).with_min_age(Some(Duration::hours(1)));
        let report = sweeper.run(Utc::now()).await.unwrap();
        assert_eq!(report.scanned, 0);

        let report = sweeper.run(Utc::now() + Duration::hours(2)).await.unwrap();
        assert_eq!(report.archived, 1);
        assert_eq!(fx.desk.orders.get_status(&order.id).await.unwrap(), OrderState::Archived);
    }

    #[tokio::test]
    async fn test_locked_order_is_skipped_and_others_proceed() {
        let store = MemoryStore::with_lock_timeout(std::time::Duration::from_millis(50));
        let fx = Fixture::with_store(store).await;
        let held = fx.order_of(&fx.tea, 1).await;
        let free = fx.order_of(&fx.bun, 1).await;

        let mut blocker = fx.store.begin().await.unwrap();
        blocker.lock_order(&held.id).await.unwrap();

        let report = fx.desk.sweeper.run(Utc::now()).await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.archived, 1);
        assert_eq!(fx.desk.orders.get_status(&free.id).await.unwrap(), OrderState::Archived);
        assert_eq!(fx.desk.orders.get_status(&held.id).await.unwrap(), OrderState::Created);

        blocker.rollback().await.unwrap();
        let retry = fx.desk.sweeper.run(Utc::now()).await.unwrap();
        assert_eq!(retry.archived, 1);
    }
}
