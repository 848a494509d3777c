//! # OrderDesk Service
//!
//! Transaction coordinator for orders, payments and the archival sweep.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         OrderDesk Services                              │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  OrderService  │  │ PaymentService │  │  ArchiveSweeper            ││
//! │  │                │  │                │  │                            ││
//! │  │ • create_order │  │ • create_paymt │  │ • run (one tx per order)   ││
//! │  │ • get_status   │  │ • mark_paid    │  │                            ││
//! │  │ • get_order    │  │ • mark_failed  │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │ CatalogService │  │ ReportService  │                                │
//! │  │ • product_at_  │  │ • daily_report │                                │
//! │  │   location     │  │                │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  ledger (stock reservation) · flow (lifecycle + persistence)            │
//! │  Store / StoreTx (PostgreSQL or in-memory) · Acquiring (injected)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `DATABASE_URL` - PostgreSQL connection string
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `LOCK_TIMEOUT_MS` - Row lock wait before `Busy` (default: 5000)
//! - `ARCHIVE_MIN_AGE_SECS` - Minimum order age for archival (default: 0)

pub mod acquiring;
pub mod config;
pub mod error;
pub mod flow;
pub mod ledger;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

use orderdesk_db::Store;
use std::sync::Arc;

// Re-exports
pub use acquiring::{Acquiring, FakeAcquiring};
pub use config::{ConfigError, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use services::{
    ArchiveSweeper, CatalogService, CreatedOrder, MarkFailedOutcome, MarkPaidOutcome,
    OrderDetails, OrderService, PaymentService, ProductAtLocation, ReportService, SweepReport,
};

/// Every service wired to one store and one acquiring handle.
#[derive(Clone)]
pub struct OrderDesk<S: Store> {
    pub orders: OrderService<S>,
    pub payments: PaymentService<S>,
    pub sweeper: ArchiveSweeper<S>,
    pub catalog: CatalogService<S>,
    pub reports: ReportService<S>,
}

impl<S: Store> OrderDesk<S> {
    pub fn new(store: S, acquiring: Arc<dyn Acquiring>) -> Self {
        OrderDesk {
            orders: OrderService::new(store.clone()),
            payments: PaymentService::new(store.clone(), acquiring),
            sweeper: ArchiveSweeper::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            reports: ReportService::new(store),
        }
    }
}
