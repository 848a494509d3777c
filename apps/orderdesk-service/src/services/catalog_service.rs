//! Product lookup at a point of sale.

use orderdesk_core::validation::{validate_barcode, validate_location_code};
use orderdesk_core::{CoreError, Location, Product};
use orderdesk_db::Store;
use serde::Serialize;

use crate::error::ServiceResult;

/// A product as offered at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductAtLocation {
    pub location: Location,
    pub product: Product,
    /// Units on hand at the location.
    pub quantity: i64,
}

/// Read-only catalog queries.
#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        CatalogService { store }
    }

    /// Looks a barcode up at a location.
    ///
    /// A product the location does not stock, or has switched off for sale,
    /// is reported as `ProductNotFound`.
    pub async fn product_at_location(
        &self,
        location_code: &str,
        barcode: &str,
    ) -> ServiceResult<ProductAtLocation> {
        let location_code = validate_location_code(location_code)?;
        let barcode = validate_barcode(barcode)?;

        let location = self
            .store
            .location_by_code(&location_code)
            .await?
            .ok_or(CoreError::LocationNotFound(location_code))?;

        let product = self
            .store
            .product_by_barcode(&barcode)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(barcode.clone()))?;

        let stock = self
            .store
            .stock(&location.id, &product.id)
            .await?
            .filter(|s| s.available_for_sale)
            .ok_or(CoreError::ProductNotFound(barcode))?;

        Ok(ProductAtLocation {
            location,
            product,
            quantity: stock.quantity,
        })
    }
}
