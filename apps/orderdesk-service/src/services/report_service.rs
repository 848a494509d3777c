//! Daily reporting read path.
//!
//! Four lock-free aggregate reads over one UTC day, folded into a
//! [`DailyReport`] by the core.

use chrono::NaiveDate;
use orderdesk_core::report::{DailyReport, DayAggregates};
use orderdesk_db::Store;
use tracing::debug;

use crate::error::ServiceResult;

#[derive(Clone)]
pub struct ReportService<S: Store> {
    store: S,
}

impl<S: Store> ReportService<S> {
    pub fn new(store: S) -> Self {
        ReportService { store }
    }

    /// Summary of the orders created on `date`.
    pub async fn daily_report(&self, date: NaiveDate) -> ServiceResult<DailyReport> {
        let aggregates = DayAggregates {
            state_counts: self.store.order_counts_by_state(date).await?,
            paid_revenue: self.store.paid_revenue(date).await?,
            locations: self.store.location_totals(date).await?,
            units_sold: self.store.units_sold_by_product(date).await?,
        };

        let report = DailyReport::build(date, aggregates);
        debug!(date = %date, orders = report.total_orders, revenue = %report.revenue, "Daily report built");
        Ok(report)
    }
}
