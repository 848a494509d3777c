//! # Error Types
//!
//! Domain-specific error types for orderdesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  orderdesk-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations, not-found lookups    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  orderdesk-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures, Busy (lock wait timeout)     │
//! │                                                                         │
//! │  orderdesk-service errors                                              │
//! │  └── ServiceError     - Core | Db, with retry classification           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these errors is retryable on its own: every `CoreError` needs a
//! different input before the caller tries again.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No active location has this external code.
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// Product cannot be resolved.
    ///
    /// ## When This Occurs
    /// - No active product carries the barcode
    /// - The location has no Stock row for the product
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Order id does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Insufficient stock to complete the order.
    ///
    /// ## User Workflow
    /// ```text
    /// create_order(POS1, [(A, 3)])
    ///      │
    ///      ▼
    /// lock Stock(POS1, A): quantity=2
    ///      │
    ///      ▼
    /// InsufficientStock { barcode: "A", available: 2, requested: 3 }
    ///      │
    ///      ▼
    /// whole transaction rolled back, no order persisted
    /// ```
    #[error("Insufficient stock for {barcode}: available {available}, requested {requested}")]
    InsufficientStock {
        barcode: String,
        available: i64,
        requested: i64,
    },

    /// A lifecycle transition was invoked from a state outside its source set.
    #[error("{entity} is {current}, cannot transition to {attempted}")]
    IllegalTransition {
        entity: &'static str,
        current: String,
        attempted: String,
    },

    /// A payment on this order already succeeded.
    #[error("Order {order_id} is already paid")]
    AlreadyPaid { order_id: String },

    /// A settlement callback arrived but no payment is pending.
    #[error("Order {order_id} has no pending payment")]
    NoPendingPayment { order_id: String },

    /// A new payment was requested for an order that no longer accepts one.
    #[error("Order {order_id} is {state}, cannot accept a new payment")]
    OrderNotOpen { order_id: String, state: String },

    /// Merged line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for the `*NotFound` family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::LocationNotFound(_)
                | CoreError::ProductNotFound(_)
                | CoreError::OrderNotFound(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any transaction is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., whitespace inside a barcode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            barcode: "4600000000017".to_string(),
            available: 2,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for 4600000000017: available 2, requested 3"
        );

        let err = CoreError::IllegalTransition {
            entity: "Order",
            current: "paid".to_string(),
            attempted: "archived".to_string(),
        };
        assert_eq!(err.to_string(), "Order is paid, cannot transition to archived");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        assert_eq!(err.to_string(), "barcode is required");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 999,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 999");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "location_code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_not_found_family() {
        assert!(CoreError::OrderNotFound("o".into()).is_not_found());
        assert!(CoreError::ProductNotFound("b".into()).is_not_found());
        assert!(!CoreError::AlreadyPaid { order_id: "o".into() }.is_not_found());
    }
}
