//! # Daily Report
//!
//! Daily statistics assembled from read-only aggregates. The storage layer
//! supplies the raw counts and sums; this module derives the rest.
//!
//! Only the data is produced here. Rendering it for people (chat messages,
//! e-mails) belongs to whoever consumes the report.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::OrderState;

/// How many products the report ranks.
pub const TOP_PRODUCTS: usize = 3;

/// Units of one product sold in paid orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUnits {
    pub product_id: String,
    pub name: String,
    pub units: i64,
}

/// Order count and paid revenue of one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationTotals {
    pub location_id: String,
    pub location_code: String,
    pub location_name: String,
    pub orders: i64,
    pub revenue_cents: i64,
}

/// Raw aggregates for one day, as read from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayAggregates {
    pub state_counts: Vec<(OrderState, i64)>,
    pub paid_revenue: Money,
    pub locations: Vec<LocationTotals>,
    pub units_sold: Vec<ProductUnits>,
}

/// Statistics for one UTC calendar day of order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub total_orders: i64,
    pub created: i64,
    pub paid: i64,
    pub cancelled: i64,
    pub archived: i64,
    /// Sum of totals of orders in `Paid`.
    pub revenue: Money,
    /// Revenue divided by paid orders, zero when nothing was paid.
    pub average_check: Money,
    /// Cancelled orders as a percentage of all orders, one decimal place.
    pub cancelled_pct: f64,
    pub locations: Vec<LocationTotals>,
    /// Best sellers by units, at most [`TOP_PRODUCTS`] entries.
    pub top_products: Vec<ProductUnits>,
}

impl DailyReport {
    /// Derives the report from one day's aggregates.
    pub fn build(date: NaiveDate, aggregates: DayAggregates) -> Self {
        let count_of = |wanted: OrderState| -> i64 {
            aggregates
                .state_counts
                .iter()
                .filter(|(state, _)| *state == wanted)
                .map(|(_, count)| *count)
                .sum()
        };

        let created = count_of(OrderState::Created);
        let paid = count_of(OrderState::Paid);
        let cancelled = count_of(OrderState::Cancelled);
        let archived = count_of(OrderState::Archived);
        let total_orders = created + paid + cancelled + archived;

        let cancelled_pct = if total_orders == 0 {
            0.0
        } else {
            (cancelled as f64 * 1000.0 / total_orders as f64).round() / 10.0
        };

        let mut locations = aggregates.locations;
        locations.sort_by(|a, b| a.location_code.cmp(&b.location_code));

        let mut top_products = aggregates.units_sold;
        top_products.retain(|p| p.units > 0);
        top_products.sort_by(|a, b| b.units.cmp(&a.units).then_with(|| a.name.cmp(&b.name)));
        top_products.truncate(TOP_PRODUCTS);

        DailyReport {
            date,
            total_orders,
            created,
            paid,
            cancelled,
            archived,
            revenue: aggregates.paid_revenue,
            average_check: aggregates.paid_revenue.average_over(paid),
            cancelled_pct,
            locations,
            top_products,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn units(name: &str, units: i64) -> ProductUnits {
        ProductUnits {
            product_id: format!("id-{name}"),
            name: name.to_string(),
            units,
        }
    }

    #[test]
    fn test_empty_day() {
        let report = DailyReport::build(day(), DayAggregates::default());
        assert_eq!(report.total_orders, 0);
        assert_eq!(report.average_check, Money::zero());
        assert_eq!(report.cancelled_pct, 0.0);
        assert!(report.top_products.is_empty());
    }

    #[test]
    fn test_derived_figures() {
        let report = DailyReport::build(
            day(),
            DayAggregates {
                state_counts: vec![
                    (OrderState::Paid, 2),
                    (OrderState::Cancelled, 1),
                    (OrderState::Archived, 3),
                ],
                paid_revenue: Money::from_cents(3001),
                locations: Vec::new(),
                units_sold: Vec::new(),
            },
        );

        assert_eq!(report.total_orders, 6);
        assert_eq!(report.created, 0);
        assert_eq!(report.average_check.cents(), 1501);
        assert_eq!(report.cancelled_pct, 16.7);
    }

    #[test]
    fn test_top_products_ranked_and_capped() {
        let report = DailyReport::build(
            day(),
            DayAggregates {
                units_sold: vec![units("Tea", 4), units("Bun", 9), units("Cake", 4), units("Jam", 1)],
                ..DayAggregates::default()
            },
        );

        let names: Vec<&str> = report.top_products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bun", "Cake", "Tea"]);
    }
}
