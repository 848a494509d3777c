//! # Stock Ledger
//!
//! Conditional decrement of per-(location, product) quantities, always
//! inside the caller's transaction and under the Stock row lock.
//!
//! ## Reservation
//! ```text
//! lock Stock(location, product)          ← blocks while another tx holds it
//!      │
//!      ├── no row             → ProductNotFound(barcode)
//!      ├── not for sale       → InsufficientStock { available: 0 }
//!      ├── quantity < wanted  → InsufficientStock { available: quantity }
//!      │
//!      ▼
//! quantity -= wanted, written in the same transaction
//! ```

use chrono::{DateTime, Utc};
use orderdesk_core::order::lock_sequence;
use orderdesk_core::{CoreError, CoreResult, Product, Stock};
use orderdesk_db::StoreTx;
use std::collections::HashMap;

use crate::error::ServiceResult;

/// Locks and reserves a single Stock row.
pub async fn reserve<T: StoreTx>(
    tx: &mut T,
    location_id: &str,
    product: &Product,
    quantity: i64,
    now: DateTime<Utc>,
) -> ServiceResult<Stock> {
    let row = tx.lock_stock(location_id, &product.id).await?;
    reserve_locked(tx, row, product, quantity, now).await
}

/// Locks the Stock rows of every product, ascending by product id.
///
/// Returns the rows keyed by product id; a product with no row maps to
/// `None`.
pub async fn lock_rows<T: StoreTx>(
    tx: &mut T,
    location_id: &str,
    products: &[&Product],
) -> ServiceResult<HashMap<String, Option<Stock>>> {
    let mut rows = HashMap::with_capacity(products.len());
    for product in lock_sequence(products.iter().copied()) {
        let row = tx.lock_stock(location_id, &product.id).await?;
        rows.insert(product.id.clone(), row);
    }
    Ok(rows)
}

/// Reserves from a row this transaction already holds locked.
pub async fn reserve_locked<T: StoreTx>(
    tx: &mut T,
    row: Option<Stock>,
    product: &Product,
    quantity: i64,
    now: DateTime<Utc>,
) -> ServiceResult<Stock> {
    let stock = take(row, product, quantity, now)?;
    tx.update_stock(&stock).await?;
    Ok(stock)
}

/// The check-and-decrement itself.
fn take(row: Option<Stock>, product: &Product, quantity: i64, now: DateTime<Utc>) -> CoreResult<Stock> {
    let mut stock = row.ok_or_else(|| CoreError::ProductNotFound(product.barcode.clone()))?;

    if !stock.can_reserve(quantity) {
        return Err(CoreError::InsufficientStock {
            barcode: product.barcode.clone(),
            available: if stock.available_for_sale { stock.quantity } else { 0 },
            requested: quantity,
        });
    }

    stock.quantity -= quantity;
    stock.updated_at = now;
    Ok(stock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::test_support::Fixture;
    use orderdesk_db::Store;

    #[tokio::test]
    async fn test_reserve_decrements_within_transaction() {
        let fx = Fixture::new().await;

        let mut tx = fx.store.begin().await.unwrap();
        let stock = reserve(&mut tx, &fx.location.id, &fx.tea, 3, Utc::now()).await.unwrap();
        assert_eq!(stock.quantity, 2);
        tx.commit().await.unwrap();

        assert_eq!(fx.stock_of(&fx.tea).await, 2);
    }

    #[tokio::test]
    async fn test_reserve_refuses_more_than_available() {
        let fx = Fixture::new().await;

        let mut tx = fx.store.begin().await.unwrap();
        let err = reserve(&mut tx, &fx.location.id, &fx.tea, 6, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientStock { available: 5, requested: 6, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_row_is_product_not_found() {
        let fx = Fixture::new().await;

        let mut tx = fx.store.begin().await.unwrap();
        let err = reserve(&mut tx, &fx.location.id, &fx.unstocked, 1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::ProductNotFound(b)) if b == fx.unstocked.barcode));
    }

    #[tokio::test]
    async fn test_row_off_sale_reserves_nothing() {
        let fx = Fixture::new().await;
        fx.set_stock(&fx.tea, 5, false).await;

        let mut tx = fx.store.begin().await.unwrap();
        let err = reserve(&mut tx, &fx.location.id, &fx.tea, 1, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_lock_rows_covers_every_product() {
        let fx = Fixture::new().await;

        let mut tx = fx.store.begin().await.unwrap();
        let rows = lock_rows(&mut tx, &fx.location.id, &[&fx.bun, &fx.tea, &fx.unstocked])
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows[&fx.tea.id].is_some());
        assert!(rows[&fx.unstocked.id].is_none());
    }
}
