//! Service implementations.
//!
//! Every mutating operation here is one store transaction: it either commits
//! as a whole or leaves nothing behind.

pub mod archive_service;
pub mod catalog_service;
pub mod order_service;
pub mod payment_service;
pub mod report_service;

pub use archive_service::{ArchiveSweeper, SweepReport};
pub use catalog_service::{CatalogService, ProductAtLocation};
pub use order_service::{CreatedOrder, OrderDetails, OrderService};
pub use payment_service::{MarkFailedOutcome, MarkPaidOutcome, PaymentService};
pub use report_service::ReportService;
